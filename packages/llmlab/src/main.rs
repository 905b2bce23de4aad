fn main() {
    if let Err(err) = llmlab::cli::run_llmlab() {
        tracing::error!(error = %err, "llmlab failed");
        std::process::exit(err.exit_code());
    }
}
