//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for a batch run with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log progress on one item.
    pub fn log_item(&self, index: usize, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            index,
            "Item progress: {}", message
        );
    }

    /// Log a recoverable problem with one item.
    pub fn log_item_warning(&self, index: usize, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            index,
            "Item warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new("gv_123", "batch_generation");

        assert_eq!(logger.job_id(), "gv_123");
        assert_eq!(logger.operation(), "batch_generation");
    }
}
