//! Run options shared by all commands

/// Options recognised by pipeline commands
///
/// Each command only honours the subset it exposes; the rest keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Pretty-print width for output JSON; `None` or `Some(0)` means compact
    pub indent: Option<usize>,
    /// Render progress counters on stderr
    pub progress: bool,
    /// Invert the meaning of valid and invalid
    pub invert: bool,
    /// Treat the first invalid record as a data error
    pub fail: bool,
    /// Escalate any record-level error to a pipeline abort
    pub abort: bool,
    /// Wrap flattened rows with their entity metadata
    pub metadata: bool,
    /// Entity name to use instead of the collection name
    pub name: Option<String>,
    /// Print final counters as JSON after the run
    pub results: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            indent: None,
            progress: false,
            invert: false,
            fail: false,
            abort: false,
            metadata: true,
            name: None,
            results: false,
        }
    }
}

impl RunOptions {
    /// Effective pretty-print width, `None` when output is compact
    pub fn indent_width(&self) -> Option<usize> {
        self.indent.filter(|width| *width > 0)
    }

    /// Entity name override, falling back to the collection name
    pub fn collection_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    /// Whether a consumer that went away is fatal for the serializer
    ///
    /// Only `abort` escalates it; `fail` is about invalid records.
    pub fn abort_on_write_error(&self) -> bool {
        self.abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_indent_is_compact() {
        let opts = RunOptions {
            indent: Some(0),
            ..RunOptions::default()
        };
        assert_eq!(opts.indent_width(), None);

        let opts = RunOptions {
            indent: Some(2),
            ..RunOptions::default()
        };
        assert_eq!(opts.indent_width(), Some(2));
    }

    #[test]
    fn name_override_wins() {
        let mut opts = RunOptions::default();
        assert_eq!(opts.collection_name("orders"), "orders");
        opts.name = Some("sales".into());
        assert_eq!(opts.collection_name("orders"), "sales");
    }

    #[test]
    fn metadata_defaults_on() {
        assert!(RunOptions::default().metadata);
    }

    #[test]
    fn only_abort_makes_a_closed_consumer_fatal() {
        let fail = RunOptions {
            fail: true,
            ..RunOptions::default()
        };
        assert!(!fail.abort_on_write_error());
        let abort = RunOptions {
            abort: true,
            ..RunOptions::default()
        };
        assert!(abort.abort_on_write_error());
    }
}
