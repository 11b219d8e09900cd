//! The per-stream hit detection machine.
//!
//! Drives framed transport lines through the coverage evaluator:
//!
//! ```text
//! Raw bytes
//!     │
//!     ├──> LineFramer (split on \n, buffer partial tails)
//!     │
//!     ├──> Sentinel classification
//!     │
//!     └──> State machine
//!          AwaitingNetworkMarker ──"<<<<<< network"──> AwaitingPathMarker
//!          AwaitingPathMarker ──"# path=coverage.xml"──> ParsingXml
//!          ParsingXml ──"<<<<<< EOF"──> Finished
//! ```
//!
//! States are strictly monotonic; no transition revisits an earlier
//! state. XML content is only ever inspected in `ParsingXml`. Lines
//! before the XML body, and stray sentinels generally, are transport
//! noise and are ignored rather than rejected.

use crate::coverage::{CoverageEvaluator, Target};
use crate::error::Result;
use crate::framing::{classify, LineClass, LineFramer};

/// Parse state, advanced only forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    AwaitingNetworkMarker,
    AwaitingPathMarker,
    ParsingXml,
    Finished,
}

/// One machine per report stream; discard after `finish`
#[derive(Debug)]
pub struct HitDetector {
    target: Target,
    state: MachineState,
    framer: LineFramer,
    evaluator: Option<CoverageEvaluator>,
    verdict: bool,
}

impl HitDetector {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            state: MachineState::AwaitingNetworkMarker,
            framer: LineFramer::new(),
            evaluator: None,
            verdict: false,
        }
    }

    /// Current machine state
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Feed one chunk of the transport body
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        for line in self.framer.push(chunk) {
            self.line_received(&line)?;
        }
        Ok(())
    }

    /// Close the stream and yield the verdict.
    ///
    /// A stream that ends without the EOF sentinel still yields whatever
    /// verdict accumulated; the transport may truncate and that is
    /// treated as end-of-input, not as an error.
    pub fn finish(mut self) -> Result<bool> {
        if let Some(tail) = self.framer.finish() {
            self.line_received(&tail)?;
        }
        if self.state != MachineState::Finished {
            log::debug!("report stream closed in {:?} without EOF marker", self.state);
        }
        if let Some(evaluator) = self.evaluator.take() {
            self.verdict = evaluator.into_verdict();
        }
        Ok(self.verdict)
    }

    /// The transition table: (state, line class) -> next state + effect
    fn line_received(&mut self, line: &[u8]) -> Result<()> {
        match (self.state, classify(line)) {
            (MachineState::AwaitingNetworkMarker, LineClass::NetworkMarker) => {
                self.state = MachineState::AwaitingPathMarker;
            }
            (MachineState::AwaitingNetworkMarker, _) => {}
            (MachineState::AwaitingPathMarker, LineClass::PathMarker) => {
                self.state = MachineState::ParsingXml;
                self.evaluator = Some(CoverageEvaluator::new(self.target.clone()));
            }
            (MachineState::AwaitingPathMarker, _) => {}
            (MachineState::ParsingXml, LineClass::EofMarker) => {
                self.state = MachineState::Finished;
                if let Some(evaluator) = self.evaluator.take() {
                    self.verdict = evaluator.into_verdict();
                }
            }
            (MachineState::ParsingXml, LineClass::Ordinary) => {
                let evaluator = self
                    .evaluator
                    .as_mut()
                    .expect("evaluator exists in ParsingXml");
                evaluator.feed(line)?;
                evaluator.feed(b"\n")?;
            }
            (MachineState::ParsingXml, _) => {
                // Stray framing sentinel inside the body: noise, skip it
            }
            (MachineState::Finished, _) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPORT_XML: &str = "<?xml version=\"1.0\" ?>\n\
        <coverage>\n<packages><package><classes>\n\
        <class filename=\"src/foo.py\" name=\"foo\">\n\
        <methods/>\n\
        <lines>\n<line number=\"41\" hits=\"0\"/>\n\
        <line number=\"42\" hits=\"3\"/>\n</lines>\n\
        </class>\n</classes></package></packages>\n</coverage>";

    fn framed(xml: &str) -> String {
        format!(
            "path/to/something.py\nanother/path.py\n<<<<<< network\n\
             # path=coverage.xml\n{xml}\n<<<<<< EOF\n"
        )
    }

    fn run(stream: &str, target: Target) -> bool {
        let mut machine = HitDetector::new(target);
        machine.feed(stream.as_bytes()).expect("clean stream");
        machine.finish().expect("clean finish")
    }

    #[test]
    fn test_hit_line_yields_true() {
        assert!(run(&framed(REPORT_XML), Target::new("src/foo.py", "42")));
    }

    #[test]
    fn test_unhit_line_yields_false() {
        assert!(!run(&framed(REPORT_XML), Target::new("src/foo.py", "41")));
    }

    #[test]
    fn test_unknown_file_yields_false() {
        assert!(!run(&framed(REPORT_XML), Target::new("src/bar.py", "42")));
    }

    #[test]
    fn test_states_advance_monotonically() {
        let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
        assert_eq!(machine.state(), MachineState::AwaitingNetworkMarker);
        machine.feed(b"noise\n").expect("ok");
        assert_eq!(machine.state(), MachineState::AwaitingNetworkMarker);
        machine.feed(b"<<<<<< network\n").expect("ok");
        assert_eq!(machine.state(), MachineState::AwaitingPathMarker);
        machine.feed(b"# path=coverage.xml\n").expect("ok");
        assert_eq!(machine.state(), MachineState::ParsingXml);
        machine.feed(b"<coverage></coverage>\n<<<<<< EOF\n").expect("ok");
        assert_eq!(machine.state(), MachineState::Finished);
    }

    #[test]
    fn test_preamble_noise_is_ignored() {
        // Markers for other sections and arbitrary noise before the body
        let stream = format!(
            "# path=ignored.txt\n<<<<<< EOF\ngarbage <xml>\n\
             <<<<<< network\nmore noise\n# path=coverage.xml\n{REPORT_XML}\n<<<<<< EOF\n"
        );
        assert!(run(&stream, Target::new("src/foo.py", "42")));
    }

    #[test]
    fn test_repeated_network_marker_is_noise() {
        let stream = format!(
            "<<<<<< network\n<<<<<< network\n# path=coverage.xml\n{REPORT_XML}\n<<<<<< EOF\n"
        );
        assert!(run(&stream, Target::new("src/foo.py", "42")));
    }

    #[test]
    fn test_mangled_path_header_never_starts_body() {
        // Without the exact "# path=coverage.xml" line the machine must
        // stay put and the XML lines remain noise
        let stream = format!(
            "<<<<<< network\npath=coverage.xml\n{REPORT_XML}\n<<<<<< EOF\n"
        );
        let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
        machine.feed(stream.as_bytes()).expect("ok");
        assert_eq!(machine.state(), MachineState::AwaitingPathMarker);
        assert!(!machine.finish().expect("lenient finish"));
    }

    #[test]
    fn test_truncated_stream_still_yields_verdict() {
        let stream = framed(REPORT_XML);
        // Cut before the EOF sentinel but after the class closed
        let cut = stream.find("</coverage>").expect("marker");
        let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
        machine.feed(stream[..cut].as_bytes()).expect("ok");
        assert!(machine.finish().expect("lenient finish"));
    }

    #[test]
    fn test_stream_closed_before_body_yields_false() {
        let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
        machine.feed(b"noise\n<<<<<< network\n").expect("ok");
        assert!(!machine.finish().expect("lenient finish"));
    }

    #[test]
    fn test_lines_after_eof_are_ignored() {
        let stream = format!(
            "{}<class filename=\"src/foo.py\"><lines>\
             <line number=\"9\" hits=\"1\"/></lines></class>\n",
            framed(REPORT_XML)
        );
        assert!(!run(&stream, Target::new("src/foo.py", "9")));
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let stream = framed(REPORT_XML);
        let target = Target::new("src/foo.py", "42");
        for chunk_size in [1, 3, 17, 1024] {
            let mut machine = HitDetector::new(target.clone());
            for chunk in stream.as_bytes().chunks(chunk_size) {
                machine.feed(chunk).expect("clean stream");
            }
            assert!(machine.finish().expect("clean finish"));
        }
    }

    #[test]
    fn test_same_stream_twice_same_verdict() {
        let stream = framed(REPORT_XML);
        let target = Target::new("src/foo.py", "42");
        let first = run(&stream, target.clone());
        let second = run(&stream, target);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_xml_is_fatal_for_the_stream() {
        let stream = framed("<coverage><classes></bogus></coverage>");
        let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
        assert!(machine.feed(stream.as_bytes()).is_err());
    }
}
