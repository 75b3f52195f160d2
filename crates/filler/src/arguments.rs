use std::path::PathBuf;

#[derive(clap::Parser)]
pub struct Arguments {
    /// Path to the TOML configuration file.
    #[clap(long, env, default_value = "config.toml")]
    pub config: PathBuf,

    /// Tracing filter directive, e.g. "info,filler=debug".
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "config: {}", self.config.display())?;
        writeln!(f, "log_filter: {}", self.log_filter)?;
        Ok(())
    }
}
