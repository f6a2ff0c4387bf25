use console::Term;
use githarvest::CancelToken;

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C cancels the crawl token so in-flight waits unwind and
/// partial results are kept; a second Ctrl+C force-quits.
pub(crate) fn setup_shutdown_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current operations...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current operations");
        }

        cancel.cancel();

        // Wait for second Ctrl+C for force quit
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install second Ctrl+C handler");

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
