use std::path::PathBuf;

use clap::Parser;
use docdrop_upload::UploadConfig;

#[derive(Debug, Parser)]
#[command(author, version, about = "Upload files and folders to the document ingest API", long_about = None)]
pub struct Cli {
    /// Files or folders to upload. Folders are scanned recursively.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Config file (defaults to the per-user config location)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Ingest endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Simultaneous uploads
    #[arg(long, short = 'j')]
    pub parallel: Option<usize>,

    /// Retries after a server-side failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Command-line flags take precedence over the config file.
    pub fn apply_overrides(&self, config: &mut UploadConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(parallel) = self.parallel {
            config.max_parallel_uploads = parallel;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "docdrop",
            "--endpoint",
            "http://ingest.local/api/documents",
            "-j",
            "5",
            "--retries",
            "0",
            "reports",
        ]);
        let mut config = UploadConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.endpoint, "http://ingest.local/api/documents");
        assert_eq!(config.max_parallel_uploads, 5);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.request_timeout_secs, None);
        assert_eq!(cli.paths, [PathBuf::from("reports")]);
    }

    #[test]
    fn no_flags_keeps_config() {
        let cli = Cli::parse_from(["docdrop", "a.pdf", "b.pdf"]);
        let mut config = UploadConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config, UploadConfig::default());
        assert_eq!(cli.paths.len(), 2);
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["docdrop"]).is_err());
    }
}
