//! Read and write multibeam sonar ping streams across several vendor datagram formats.
//!
//! A [`formats`] module (one per supported wire format) decodes bytes into [`Record`]s; a
//! [`reader::PingReader`] assembles those records into bathymetry-corrected [`ping::Ping`]s,
//! interpolating navigation, attitude, heading, and draft along the way. [`writer::PingWriter`]
//! does the reverse. Picking which format module applies to a given file is left to the caller
//!.
//!
//! ```no_run
//! use swath::formats::{register_format, simrad};
//! use swath::reader::{PingReader, ReadEvent};
//! use swath::session::SessionOptions;
//!
//! # fn run() -> swath::error::Result<()> {
//! let file = std::fs::File::open("survey.all")?;
//! let handle = register_format(simrad::format_info());
//! let options = SessionOptions::default();
//! let mut reader = PingReader::from_reader(file, simrad::SimradCodec, handle, &options)?;
//! while let Some(event) = reader.read_next()? {
//!     if let ReadEvent::Ping(ping) = event {
//!         println!("ping {} at {}", ping.ping_number, ping.time);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod bathymetry;
pub mod byte_codec;
pub mod error;
pub mod formats;
pub mod framer;
pub mod ping;
pub mod reader;
pub mod record;
pub mod sensors;
pub mod session;
pub mod store;
pub mod writer;

pub use error::{Error, Result};
pub use framer::Framer;
pub use ping::Ping;
pub use reader::{PingReader, ReadEvent};
pub use record::Record;
pub use session::{SessionOptions, SessionState};
pub use store::StoreModel;
pub use writer::PingWriter;
