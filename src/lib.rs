//! # TTML Live Processor: Validation, Sequencing and Merging for Live TTML Subtitles
//!
//! This crate implements the authoring-side semantic engine for live,
//! time-synchronized TTML subtitle streams as used in broadcast captioning.
//! Documents arrive as discrete segments of a logically continuous rolling
//! caption stream; each segment is parsed, validated against rules that go
//! beyond what a schema can express (timing-scope consistency, per-profile
//! attribute combinations, cross-referential integrity of styles and
//! regions), and then either accepted into a live sequence or merged with
//! the currently active document to produce the next on-air state.
//!
//! The entry points you will use most are:
//! - [`Document::create_from_markup`]: parse and fully validate one segment.
//! - [`DocumentSequence::ingest`]: gate, order and merge segments of a stream.
//! - [`merge_documents`]: combine two documents' bodies with identifier
//!   deconfliction.
//!
//! ## ⚠️ Important: Not a Renderer
//!
//! This library models and sequences documents; it does not rasterize
//! captions, speak the delivery transport's wire framing, or perform
//! schema-level XML validation beyond the profile's content model. Transport
//! and presentation are external collaborators (see [`SequenceConsumerNode`]).
//!
//! ## Examples
//!
//! ```rust
//! use ttml_live_processor::{DeliveryMode, Document, DocumentSequence, TimeBase};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let markup = r#"<tt xmlns="http://www.w3.org/ns/ttml"
//!         xmlns:ttp="http://www.w3.org/ns/ttml#parameter"
//!         ttp:timeBase="media" ttp:sequenceIdentifier="demoSeq"
//!         ttp:sequenceNumber="1" xml:lang="en-GB">
//!       <body><p xml:id="c1" begin="1s" end="2.5s">Hello</p></body>
//!     </tt>"#;
//!
//!     // 1. Parse and validate one segment.
//!     let document = Document::create_from_markup(markup)?;
//!     assert_eq!(document.sequence_number(), 1);
//!     assert_eq!(
//!         document.resolved_begin_time(),
//!         Some(std::time::Duration::from_secs(1))
//!     );
//!
//!     // 2. Feed segments into a rolling sequence.
//!     let mut sequence = DocumentSequence::new(
//!         "demoSeq", "en-GB", TimeBase::Media, None, DeliveryMode::Rolling,
//!     );
//!     sequence.ingest(document)?;
//!
//!     // 3. The next segment reuses the same identifier; the merge renames
//!     //    the colliding copy deterministically.
//!     let incoming = Document::create_from_markup(
//!         &markup.replace("\"1\"", "\"2\"").replace("Hello", "World"),
//!     )?;
//!     let merged = sequence.ingest(incoming)?.expect("changed on-air state");
//!     assert!(merged.get_element_by_id("c1").is_ok());
//!     assert!(merged.get_element_by_id("c1.1").is_ok());
//!
//!     Ok(())
//! }
//! ```

mod document;
mod error;
mod generator;
mod merge;
mod model;
mod node;
mod parser;
mod sequence;
mod time;
mod validation;

pub use document::{DeliveryMode, Document};
pub use error::{DocumentError, ParseError, SemanticError};
pub use merge::merge_documents;
pub use model::{
    ContentElement, ElementKind, ElementNode, ElementTree, NodeId, RegionElement, StyleAttributes,
    StyleElement, TtElement, XmlSpace,
};
pub use node::{ProducerCarriage, SequenceConsumerNode, emit_document};
pub use sequence::DocumentSequence;
pub use time::{
    ClockMode, DropMode, FrameRateMultiplier, MarkerMode, SmpteParameters, TimeBase,
    TimeExpression, duration_to_smpte, parse_time_expression, smpte_to_duration,
};
pub use validation::{ValidationState, registry::ElementRegistry};
