use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (MKT_STRIPE_SECRET_KEY, MKT_STRIPE_WEBHOOK_SECRET) are never listed here
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_CURRENCY",
        "MKT_MAX_COMMISSION_RATE",
        "MKT_ORDER_AUTO_CANCEL_PENDING_MINUTES",
        "MKT_ORDER_AUTO_CANCEL_CHECK_INTERVAL_MINUTES",
        "MKT_STRIPE_API_URL",
        "MKT_STRIPE_PUBLISHABLE_KEY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<46} {val:<15}");
    })
}
