//! # Covscan Stream
//!
//! Streaming hit detection over codecov report uploads.
//!
//! A report upload is a line-oriented transport body wrapping an
//! embedded Cobertura-style XML document. This crate turns one such
//! stream into a single boolean verdict ("did this report exercise
//! the target file and line?") without ever materializing the whole
//! document.
//!
//! ## Architecture
//!
//! ```text
//! Raw byte chunks
//!     │
//!     ├──> LineFramer (\n-delimited lines, partial tails buffered)
//!     │
//!     ├──> HitDetector state machine
//!     │    ├─> preamble noise: ignored
//!     │    ├─> "<<<<<< network" / "# path=coverage.xml": advance state
//!     │    └─> XML body lines: fed to the evaluator
//!     │
//!     └──> CoverageEvaluator
//!          ├─> XmlTokenizer (incremental start/end events)
//!          ├─> retain only the open ancestor chain + one class subtree
//!          └─> latch the verdict on the first matching non-zero hit
//! ```
//!
//! ## Example
//!
//! ```rust
//! use covscan_stream::{HitDetector, Target};
//!
//! // The path-header sentinel is kept mid-line: rustdoc strips a
//! // leading "# " from doctest lines as a hidden-line marker.
//! let stream = "preamble noise\n\
//!     <<<<<< network\n# path=coverage.xml\n\
//!     <coverage><packages><package><classes>\n\
//!     <class filename=\"src/foo.py\" name=\"foo\">\n\
//!     <lines><line number=\"42\" hits=\"3\"/></lines>\n\
//!     </class>\n\
//!     </classes></package></packages></coverage>\n\
//!     <<<<<< EOF\n";
//!
//! let mut machine = HitDetector::new(Target::new("src/foo.py", "42"));
//! machine.feed(stream.as_bytes()).unwrap();
//! assert!(machine.finish().unwrap());
//! ```

mod coverage;
mod error;
mod framing;
mod machine;
mod xml;

pub use coverage::{CoverageEvaluator, Target};
pub use error::{Result, StreamError};
pub use framing::{LineClass, LineFramer};
pub use machine::{HitDetector, MachineState};
