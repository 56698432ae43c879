//! Import accounting and the diagnostic report
//!
//! Four disjoint-by-construction identifier sets track how every module
//! entered the cache: placeholders created, real loads through a
//! placeholder, eager loads through the bypass policy, and modules already
//! present when the hook was installed. The report renders the sets plus a
//! "lost track" diff against the live cache.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::rc::Rc;

use latemod_config::ReportMode;

/// Counters for the import report
#[derive(Debug, Default, Clone)]
pub struct ImportStats {
    /// Names currently (or formerly) behind a placeholder
    proxied: BTreeSet<String>,
    /// Total placeholders ever created, including names re-proxied later
    proxy_tally: usize,
    /// Names loaded for real through a placeholder
    loaded: BTreeSet<String>,
    /// Names that loaded eagerly via the bypass policy
    ignored: BTreeSet<String>,
    /// Names already loaded before the import hook was installed
    preexisting: BTreeSet<String>,
}

impl ImportStats {
    pub(crate) fn note_proxy(&mut self, name: &str) {
        self.proxied.insert(name.to_string());
        self.proxy_tally += 1;
    }

    /// A placeholder was resolved; the name moves from proxied to loaded.
    pub(crate) fn note_loaded(&mut self, name: &str) {
        self.proxied.remove(name);
        self.loaded.insert(name.to_string());
    }

    pub(crate) fn note_ignored(&mut self, name: &str) {
        self.ignored.insert(name.to_string());
    }

    pub(crate) fn snapshot_preexisting<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.preexisting.extend(names);
    }

    pub fn proxied(&self) -> &BTreeSet<String> {
        &self.proxied
    }

    pub fn proxy_tally(&self) -> usize {
        self.proxy_tally
    }

    pub fn loaded(&self) -> &BTreeSet<String> {
        &self.loaded
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    pub fn preexisting(&self) -> &BTreeSet<String> {
        &self.preexisting
    }

    /// Live cache names none of the sets account for
    pub fn untracked(&self, live: &BTreeSet<String>) -> BTreeSet<String> {
        live.iter()
            .filter(|name| {
                !self.loaded.contains(*name)
                    && !self.proxied.contains(*name)
                    && !self.ignored.contains(*name)
                    && !self.preexisting.contains(*name)
            })
            .cloned()
            .collect()
    }
}

/// Shared writable sink, so tests can capture report output.
pub type ReportSink = Rc<RefCell<dyn Write>>;

/// Renders import events and the summary report.
pub struct Reporter {
    mode: ReportMode,
    memory_probe: Option<Box<dyn Fn() -> f64>>,
    sink: ReportSink,
}

impl Default for Reporter {
    fn default() -> Self {
        Self {
            mode: ReportMode::Off,
            memory_probe: None,
            sink: Rc::new(RefCell::new(io::stderr())),
        }
    }
}

impl Reporter {
    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ReportMode) {
        self.mode = mode;
    }

    /// Install a process-memory probe (megabytes). When set, every event
    /// line carries the current figure.
    pub fn set_memory_probe(&mut self, probe: Box<dyn Fn() -> f64>) {
        self.memory_probe = Some(probe);
    }

    pub fn set_sink(&mut self, sink: ReportSink) {
        self.sink = sink;
    }

    /// Emit one event. Load events (`load <name>`) print a single line in
    /// `Verbose` mode and the full set breakdown in `VerboseDetail`;
    /// anything else always gets the breakdown.
    pub fn report(&self, event: &str, stats: &ImportStats, live: &BTreeSet<String>) {
        if self.mode == ReportMode::Off {
            return;
        }
        let is_load = event.starts_with("load ");
        let mut sink = self.sink.borrow_mut();
        let header = if is_load {
            format!("latemod: {}", event)
        } else {
            format!("latemod report: {}", event)
        };
        match &self.memory_probe {
            Some(probe) => {
                let _ = writeln!(sink, "{} (now using {:.3} Mb)", header, probe());
            }
            None => {
                let _ = writeln!(sink, "{}", header);
            }
        }
        if is_load && self.mode != ReportMode::VerboseDetail {
            return;
        }
        let untracked = stats.untracked(live);
        let _ = writeln!(
            sink,
            "proxy imported {} {:?}",
            stats.proxied().len(),
            stats.proxied()
        );
        let _ = writeln!(
            sink,
            "proxy imported (maximum size reached) {}",
            stats.proxy_tally()
        );
        let _ = writeln!(
            sink,
            "fully imported (preexisting) {} {:?}",
            stats.preexisting().len(),
            stats.preexisting()
        );
        let _ = writeln!(
            sink,
            "fully imported (via latemod) {} {:?}",
            stats.loaded().len(),
            stats.loaded()
        );
        let _ = writeln!(
            sink,
            "fully imported (via allowed bypass) {} {:?}",
            stats.ignored().len(),
            stats.ignored()
        );
        let _ = writeln!(
            sink,
            "fully imported (lost track of these) {} {:?}",
            untracked.len(),
            untracked
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture() -> (Rc<RefCell<Vec<u8>>>, ReportSink) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        let sink: ReportSink = Rc::new(RefCell::new(SharedBuf(buf.clone())));
        (buf, sink)
    }

    #[test]
    fn test_stats_transitions() {
        let mut stats = ImportStats::default();
        stats.note_proxy("a");
        stats.note_proxy("b");
        stats.note_loaded("a");

        assert_eq!(stats.proxy_tally(), 2);
        assert!(stats.loaded().contains("a"));
        assert!(!stats.proxied().contains("a"));
        assert!(stats.proxied().contains("b"));
    }

    #[test]
    fn test_untracked_diff() {
        let mut stats = ImportStats::default();
        stats.note_loaded("a");
        stats.note_ignored("b");
        stats.snapshot_preexisting(["c".to_string()]);

        let live: BTreeSet<String> = ["a", "b", "c", "mystery"]
            .into_iter()
            .map(String::from)
            .collect();
        let untracked = stats.untracked(&live);
        assert_eq!(untracked.into_iter().collect::<Vec<_>>(), vec!["mystery"]);
    }

    #[test]
    fn test_report_off_writes_nothing() {
        let (buf, sink) = capture();
        let mut reporter = Reporter::default();
        reporter.set_sink(sink);
        reporter.report("load a", &ImportStats::default(), &BTreeSet::new());
        assert!(buf.borrow().is_empty());
    }

    #[test]
    fn test_verbose_load_is_one_line() {
        let (buf, sink) = capture();
        let mut reporter = Reporter::default();
        reporter.set_sink(sink);
        reporter.set_mode(ReportMode::Verbose);
        reporter.report("load math", &ImportStats::default(), &BTreeSet::new());

        let out = String::from_utf8(buf.borrow().clone()).unwrap();
        assert_eq!(out, "latemod: load math\n");
    }

    #[test]
    fn test_summary_report_lists_sets() {
        let (buf, sink) = capture();
        let mut reporter = Reporter::default();
        reporter.set_sink(sink);
        reporter.set_mode(ReportMode::Verbose);
        reporter.set_memory_probe(Box::new(|| 12.5));

        let mut stats = ImportStats::default();
        stats.note_proxy("slow");
        stats.note_ignored("eager");
        reporter.report("shutdown", &stats, &BTreeSet::new());

        let out = String::from_utf8(buf.borrow().clone()).unwrap();
        assert!(out.starts_with("latemod report: shutdown (now using 12.500 Mb)\n"));
        assert!(out.contains("proxy imported 1"));
        assert!(out.contains("fully imported (via allowed bypass) 1"));
        assert!(out.contains("lost track of these"));
    }
}
