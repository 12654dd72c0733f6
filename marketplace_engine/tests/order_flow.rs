use marketplace_engine::{
    db_types::{Money, OrderStatus, PaymentMethod, PaymentStatus, Product, Seller, SellerApprovalStatus},
    helpers::Clock,
    order_objects::SubOrderQueryFilter,
    test_utils::seed::rate,
    traits::DateRange,
    CatalogManagement,
    EarningsApi,
    MarketplaceDatabase,
    MarketplaceError,
};
use tokio::runtime::Runtime;

use crate::support::{checkout, paid_card_order, setup, stock_of, tear_down};

mod support;

fn init_logs() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
}

#[test]
fn single_seller_checkout() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order =
            system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[("rug", 4)])).await.expect("checkout");
        assert!(!order.is_master_order);
        assert_eq!(order.items_price, Money::from_major(100));
        assert_eq!(order.tax_price, Money::from_major(10));
        assert_eq!(order.shipping_price, Money::from_major(10));
        assert_eq!(order.total_price, Money::from_major(120));
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.sub_orders.len(), 1);
        assert_eq!(order.created_at, system.clock.now());

        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert_eq!(subs.len(), 1);
        let sub = &subs[0];
        assert_eq!(sub.seller_id, "alice");
        assert_eq!(sub.buyer_id, "buyer1");
        assert_eq!(sub.subtotal, Money::from_major(100));
        assert_eq!(sub.commission, Money::from_major(20));
        assert_eq!(sub.seller_earnings, Money::from_major(80));
        assert_eq!(sub.seller_approval_status, SellerApprovalStatus::Pending);
        assert!(!sub.earnings_released);
        assert_eq!(stock_of(&system, "rug").await, 6);
        tear_down(system).await;
    });
}

#[test]
fn two_seller_checkout_is_split_by_seller() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let items = [("lamp", 1), ("novel", 2), ("rug", 1)];
        let order = system.api.create_order(checkout("buyer1", PaymentMethod::Card, &items)).await.expect("checkout");
        assert!(order.is_master_order);
        assert_eq!(order.items_price, Money::from_major(100));
        assert_eq!(order.total_price, Money::from_major(120));
        let names = order.items.iter().map(|i| i.product_id.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["lamp", "novel", "rug"]);
        assert_eq!(order.items[0].image, "/img/lamp.png");

        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert_eq!(subs.len(), 2);
        let (alice, bob) = (&subs[0], &subs[1]);
        assert_eq!(alice.seller_id, "alice");
        assert_eq!(alice.subtotal, Money::from_major(60));
        assert_eq!(alice.commission, Money::from_major(12));
        assert_eq!(alice.seller_earnings, Money::from_major(48));
        assert_eq!(alice.items.iter().map(|i| i.product_id.as_str()).collect::<Vec<_>>(), vec!["lamp", "rug"]);
        assert_eq!(bob.seller_id, "bob");
        assert_eq!(bob.subtotal, Money::from_major(40));
        assert_eq!(bob.commission, Money::from_major(4));
        assert_eq!(bob.seller_earnings, Money::from_major(36));

        let subtotal: Money = subs.iter().map(|s| s.subtotal).sum();
        assert_eq!(subtotal, order.items_price);
        for sub in &subs {
            assert_eq!(sub.commission + sub.seller_earnings, sub.subtotal);
            assert!(sub.items.iter().all(|i| order.items.contains(i)));
        }
        tear_down(system).await;
    });
}

#[test]
fn duplicate_lines_are_merged() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let items = [("lamp", 1), ("novel", 1), ("lamp", 2)];
        let order = system.api.create_order(checkout("buyer1", PaymentMethod::Card, &items)).await.expect("checkout");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_id, "lamp");
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(stock_of(&system, "lamp").await, 7);
        tear_down(system).await;
    });
}

#[test]
fn failed_checkouts_leave_nothing_behind() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let err = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::Card, &[("lamp", 1), ("atlas", 2)]))
            .await
            .expect_err("atlas has one in stock");
        assert!(matches!(err, MarketplaceError::OutOfStock { requested: 2, available: 1, .. }), "{err}");

        let err = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::Card, &[("lamp", 1), ("ghost", 1)]))
            .await
            .expect_err("ghost is not in the catalog");
        assert!(matches!(err, MarketplaceError::ProductNotFound(ref id) if id == "ghost"), "{err}");

        let err = system
            .api
            .create_order(checkout("", PaymentMethod::Card, &[("lamp", 1)]))
            .await
            .expect_err("no buyer");
        assert!(matches!(err, MarketplaceError::ValidationError(_)), "{err}");

        let err =
            system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[])).await.expect_err("no items");
        assert!(matches!(err, MarketplaceError::ValidationError(_)), "{err}");

        assert!(system.api.fetch_orders_for_buyer("buyer1").await.unwrap().is_empty());
        assert_eq!(stock_of(&system, "lamp").await, 10);
        assert_eq!(stock_of(&system, "atlas").await, 1);
        tear_down(system).await;
    });
}

#[test]
fn commission_rate_ceiling_is_enforced() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let db = system.api.db();
        db.upsert_seller(&Seller::new("carol", "Carol's Curios", rate(60.0))).await.unwrap();
        db.upsert_product(&Product::new("clock", "carol", "Cuckoo clock", Money::from_major(80), 3)).await.unwrap();
        let err = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::Card, &[("clock", 1)]))
            .await
            .expect_err("60% is above the ceiling");
        assert!(matches!(err, MarketplaceError::InvalidCommissionRate(_)), "{err}");
        assert_eq!(stock_of(&system, "clock").await, 3);
        tear_down(system).await;
    });
}

#[test]
fn commission_rate_is_fixed_at_checkout() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order =
            system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[("vase", 1)])).await.expect("checkout");
        system.api.db().upsert_seller(&Seller::new("alice", "Alice's Attic", rate(30.0))).await.unwrap();
        let sub = system.api.fetch_sub_orders_for_order(order.id).await.unwrap().remove(0);
        assert_eq!(sub.commission_rate, rate(20.0));
        assert_eq!(sub.commission, Money::from_major(10));
        let later =
            system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[("vase", 1)])).await.expect("checkout");
        let sub = system.api.fetch_sub_orders_for_order(later.id).await.unwrap().remove(0);
        assert_eq!(sub.commission, Money::from_major(15));
        tear_down(system).await;
    });
}

#[test]
fn cancelling_restores_stock() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let items = [("lamp", 2), ("novel", 3)];
        let order = system.api.create_order(checkout("buyer1", PaymentMethod::Card, &items)).await.expect("checkout");
        assert_eq!(stock_of(&system, "lamp").await, 8);
        assert_eq!(stock_of(&system, "novel").await, 7);

        let err = system.api.cancel_order(order.id, "buyer2").await.expect_err("not their order");
        assert!(matches!(err, MarketplaceError::Forbidden(_)), "{err}");

        let order = system.api.cancel_order(order.id, "buyer1").await.expect("cancel");
        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&system, "lamp").await, 10);
        assert_eq!(stock_of(&system, "novel").await, 10);
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert!(subs.iter().all(|s| s.order_status == OrderStatus::Cancelled));

        let err = system.api.cancel_order(order.id, "buyer1").await.expect_err("already cancelled");
        assert!(matches!(err, MarketplaceError::OrderLocked(OrderStatus::Cancelled)), "{err}");
        assert_eq!(stock_of(&system, "lamp").await, 10);
        tear_down(system).await;
    });
}

#[test]
fn lifecycle_and_lock() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::CashOnDelivery, &[("novel", 1)]))
            .await
            .expect("checkout");
        let id = order.id;
        system.api.update_order_status(id, OrderStatus::Processing).await.expect("processing");
        system.api.update_order_status(id, OrderStatus::Shipped).await.expect("shipped");

        let err = system.api.update_order_status(id, OrderStatus::Processing).await.expect_err("backwards");
        assert!(matches!(err, MarketplaceError::InvalidStatusTransition { .. }), "{err}");
        let err = system.api.cancel_order(id, "buyer1").await.expect_err("shipped orders can't be cancelled by buyers");
        assert!(matches!(err, MarketplaceError::InvalidStatusTransition { .. }), "{err}");

        let order = system.api.update_order_status(id, OrderStatus::Delivered).await.expect("delivered");
        assert_eq!(order.delivered_at, Some(system.clock.now()));
        let sub = system.api.fetch_sub_orders_for_order(id).await.unwrap().remove(0);
        assert_eq!(sub.order_status, OrderStatus::Delivered);
        assert!(sub.earnings_released);
        assert!(sub.delivered_at.is_some());

        for status in [OrderStatus::Cancelled, OrderStatus::Shipped] {
            let err = system.api.update_order_status(id, status).await.expect_err("delivered is final");
            assert!(matches!(err, MarketplaceError::OrderLocked(OrderStatus::Delivered)), "{err}");
        }
        tear_down(system).await;
    });
}

#[test]
fn multi_seller_orders_wait_for_seller_approval() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::CashOnDelivery, &[("lamp", 1), ("novel", 1)]))
            .await
            .expect("checkout");
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();

        let err = system.api.update_order_status(order.id, OrderStatus::Processing).await.expect_err("gated");
        assert!(matches!(err, MarketplaceError::PendingSellerApproval(2)), "{err}");

        system.api.update_seller_approval(subs[0].id, SellerApprovalStatus::Approved).await.expect("approve");
        let err = system.api.update_order_status(order.id, OrderStatus::Shipped).await.expect_err("still gated");
        assert!(matches!(err, MarketplaceError::PendingSellerApproval(1)), "{err}");

        let err = system
            .api
            .update_seller_approval(subs[0].id, SellerApprovalStatus::NotApproved)
            .await
            .expect_err("decisions are final");
        assert!(matches!(err, MarketplaceError::InvalidApprovalTransition { .. }), "{err}");

        system.api.update_seller_approval(subs[1].id, SellerApprovalStatus::NotApproved).await.expect("decline");
        let order = system.api.update_order_status(order.id, OrderStatus::Processing).await.expect("ungated");
        assert_eq!(order.order_status, OrderStatus::Processing);
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert_eq!(subs[0].order_status, OrderStatus::Processing);
        assert_eq!(subs[1].order_status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&system, "novel").await, 10);
        assert_eq!(stock_of(&system, "lamp").await, 9);
        tear_down(system).await;
    });
}

#[test]
fn paid_multi_seller_orders_stay_gated() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = paid_card_order(&system, "buyer1", &[("lamp", 1), ("novel", 1)], "pi_gate").await;
        assert_eq!(order.order_status, OrderStatus::Processing);

        for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
            let err = system.api.update_order_status(order.id, status).await.expect_err("payment keeps the gate shut");
            assert!(matches!(err, MarketplaceError::PendingSellerApproval(2)), "{err}");
        }
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert!(subs.iter().all(|s| s.order_status == OrderStatus::Processing && !s.earnings_released));
        let (alice, bob) = (subs[0].id, subs[1].id);

        system.api.update_seller_approval(alice, SellerApprovalStatus::Approved).await.expect("approve");
        system.api.update_seller_approval(bob, SellerApprovalStatus::NotApproved).await.expect("decline");
        let err = system
            .api
            .update_sub_order_status(bob, OrderStatus::Delivered, Some("bob"))
            .await
            .expect_err("declined sub-orders never ship");
        assert!(matches!(err, MarketplaceError::InvalidStatusTransition { .. }), "{err}");

        let order = system.api.update_order_status(order.id, OrderStatus::Delivered).await.expect("delivered");
        assert_eq!(order.order_status, OrderStatus::Delivered);
        let alice = system.api.fetch_sub_order(alice).await.unwrap().unwrap();
        assert_eq!(alice.order_status, OrderStatus::Delivered);
        assert!(alice.earnings_released);
        let bob = system.api.fetch_sub_order(bob).await.unwrap().unwrap();
        assert_eq!(bob.order_status, OrderStatus::Cancelled);
        assert!(!bob.earnings_released);
        assert_eq!(stock_of(&system, "novel").await, 10);
        assert_eq!(stock_of(&system, "lamp").await, 9);

        let earnings = EarningsApi::new(system.api.db().clone());
        let declined = earnings.seller_earnings("bob", DateRange::all_time()).await.unwrap();
        assert_eq!(declined.order_count, 0);
        assert_eq!(declined.total_earnings, Money::default());
        tear_down(system).await;
    });
}

#[test]
fn cancellation_is_never_gated() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::Card, &[("lamp", 1), ("novel", 1)]))
            .await
            .expect("checkout");
        let order = system.api.update_order_status(order.id, OrderStatus::Cancelled).await.expect("admin cancel");
        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&system, "lamp").await, 10);
        assert_eq!(stock_of(&system, "novel").await, 10);
        tear_down(system).await;
    });
}

#[test]
fn sellers_fulfil_their_own_sub_orders() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = system
            .api
            .create_order(checkout("buyer1", PaymentMethod::CashOnDelivery, &[("lamp", 1), ("novel", 1)]))
            .await
            .expect("checkout");
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        let (alice, bob) = (subs[0].id, subs[1].id);

        let err = system
            .api
            .update_sub_order_status(alice, OrderStatus::Shipped, Some("bob"))
            .await
            .expect_err("bob doesn't own this");
        assert!(matches!(err, MarketplaceError::Forbidden(_)), "{err}");

        let sub = system.api.update_sub_order_status(alice, OrderStatus::Delivered, Some("alice")).await.unwrap();
        assert!(sub.earnings_released);
        let master = system.api.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(master.order_status, OrderStatus::Pending);

        let sub = system.api.update_sub_order_status(bob, OrderStatus::Cancelled, Some("bob")).await.unwrap();
        assert_eq!(sub.order_status, OrderStatus::Cancelled);
        assert!(!sub.earnings_released);
        assert_eq!(stock_of(&system, "novel").await, 10);
        assert_eq!(stock_of(&system, "lamp").await, 9);

        let err = system.api.update_sub_order_status(alice, OrderStatus::Cancelled, None).await.expect_err("final");
        assert!(matches!(err, MarketplaceError::OrderLocked(OrderStatus::Delivered)), "{err}");
        let released = system.api.fetch_sub_order(alice).await.unwrap().unwrap();
        assert!(released.earnings_released);

        let seller_view = system
            .api
            .fetch_sub_orders_for_seller("alice", SubOrderQueryFilter::default().with_order_status(OrderStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(seller_view.len(), 1);
        assert_eq!(seller_view[0].id, alice);
        tear_down(system).await;
    });
}

#[test]
fn concurrent_checkouts_never_oversell() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let a = system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[("atlas", 1)]));
        let b = system.api.create_order(checkout("buyer2", PaymentMethod::Card, &[("atlas", 1)]));
        let (a, b) = tokio::join!(a, b);
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "{a:?} {b:?}");
        let failure = if a.is_err() { a } else { b };
        assert!(matches!(
            failure,
            Err(MarketplaceError::OutOfStock { .. }) |
                Err(MarketplaceError::InsufficientStock { .. }) |
                Err(MarketplaceError::VersionConflict(_))
        ));
        assert_eq!(stock_of(&system, "atlas").await, 0);
        tear_down(system).await;
    });
}

#[test]
fn buyer_cancel_and_admin_ship_race_has_one_winner() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        for _ in 0..10 {
            let order = system
                .api
                .create_order(checkout("buyer1", PaymentMethod::CashOnDelivery, &[("rug", 2)]))
                .await
                .expect("checkout");
            assert_eq!(stock_of(&system, "rug").await, 8);
            let cancel = system.api.cancel_order(order.id, "buyer1");
            let ship = system.api.update_order_status(order.id, OrderStatus::Shipped);
            let (cancel, ship) = tokio::join!(cancel, ship);
            assert!(cancel.is_ok() != ship.is_ok(), "{cancel:?} {ship:?}");

            let order = system.api.fetch_order(order.id).await.unwrap().unwrap();
            let sub = system.api.fetch_sub_orders_for_order(order.id).await.unwrap().remove(0);
            assert_eq!(sub.order_status, order.order_status);
            if cancel.is_ok() {
                assert_eq!(order.order_status, OrderStatus::Cancelled);
                assert_eq!(stock_of(&system, "rug").await, 10);
            } else {
                assert_eq!(order.order_status, OrderStatus::Shipped);
                assert_eq!(stock_of(&system, "rug").await, 8);
                // put the stock back for the next round
                system.api.update_order_status(order.id, OrderStatus::Cancelled).await.expect("admin cancel");
                assert_eq!(stock_of(&system, "rug").await, 10);
            }
        }
        tear_down(system).await;
    });
}

#[test]
fn stale_snapshots_are_rejected() {
    init_logs();
    Runtime::new().unwrap().block_on(async {
        let system = setup().await;
        let order = system.api.create_order(checkout("buyer1", PaymentMethod::Card, &[("vase", 3)])).await.unwrap();
        let snapshot = system.api.fetch_order(order.id).await.unwrap().unwrap();
        system.api.cancel_order(order.id, "buyer1").await.expect("cancel");
        assert_eq!(stock_of(&system, "vase").await, 10);

        let now = system.clock.now();
        let err = system
            .api
            .db()
            .update_order_status(&snapshot, OrderStatus::Cancelled, now)
            .await
            .expect_err("snapshot is out of date");
        assert!(matches!(err, MarketplaceError::VersionConflict(_)), "{err}");
        assert_eq!(stock_of(&system, "vase").await, 10);
        let subs = system.api.fetch_sub_orders_for_order(order.id).await.unwrap();
        assert!(subs.iter().all(|s| s.order_status == OrderStatus::Cancelled));
        tear_down(system).await;
    });
}
