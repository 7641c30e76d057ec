use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 25] = [
        "RUST_LOG",
        "MPG_HOST",
        "MPG_PORT",
        "MPG_DATABASE_URL",
        "MPG_RECONCILIATION_ENABLED",
        "MPG_RECONCILIATION_INTERVAL_SECS",
        "MPG_RECONCILIATION_MIN_AGE_SECS",
        "MPG_RECONCILIATION_BATCH_SIZE",
        "MPG_RECONCILIATION_MAX_RETRIES",
        "MPG_MTN_MOMO_BASE_URL",
        "MPG_MTN_MOMO_ENV",
        "MPG_MTN_MOMO_API_USER",
        "MPG_MTN_MOMO_CURRENCY",
        "MPG_MTN_MOMO_CALLBACK_URL",
        "MPG_MTN_MOMO_TIMEOUT_SECS",
        "MPG_MTN_MOMO_HMAC_CHECKS",
        "MPG_MTN_MOMO_HMAC_HEADER",
        "MPG_AIRTEL_BASE_URL",
        "MPG_AIRTEL_CLIENT_ID",
        "MPG_AIRTEL_COUNTRY",
        "MPG_AIRTEL_CURRENCY",
        "MPG_AIRTEL_DIAL_CODE",
        "MPG_AIRTEL_TIMEOUT_SECS",
        "MPG_AIRTEL_HMAC_CHECKS",
        "MPG_AIRTEL_HMAC_HEADER",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
