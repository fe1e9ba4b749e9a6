//! An implementation of the Elantech PS/2 touchpad protocol.
//!
//! Elantech touchpads are found in a lot of laptops. Out of the box they
//! behave like a generic PS/2 mouse, but once they are identified and
//! switched to absolute mode they report the positions of up to five fingers.
//! Everything beyond the generic mouse protocol is proprietary and has been
//! reverse engineered by the community over the years, which is why the
//! protocol comes in four hardware generations with slightly different
//! command framing, register access and packet layouts.
//!
//! This crate covers:
//!
//! - detection of Elantech touchpads (magic knock and signature check)
//! - resolution of the hardware generation, coordinate bounds, resolution
//!   and trace geometry
//! - register access for all four generations
//! - decoding of the V4 multi-touch packet stream
//!
//! # Quickstart
//!
//! ## Establish PS/2 communication
//!
//! This crate implements the Elantech protocol, not the underlying PS/2
//! communication, which is left to the platform. The trait used for bridging
//! your PS/2 implementation to this crate is [`channel::RawPs2Channel`], so
//! make sure to provide an implementation for it. The crate never sleeps on
//! its own either, waiting between retries goes through [`channel::Delay`].
//! Both traits define async methods using [`mod@async_trait`], which is
//! re-exported for annotating your implementing types.
//!
//! ## Identify the touchpad
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use elantech::{
//!     channel::Ps2Channel,
//!     config::{AbsoluteModeConfig, RetryConfig, StreamConfig},
//!     device::Touchpad,
//!     mt::PacketEvent,
//! };
//!
//! let channel = Arc::new(Ps2Channel::new(my_ps2_channel, my_delay));
//!
//! // This returns `SetupError::NotElantech` if the device behind the channel
//! // is not an Elantech touchpad.
//! let touchpad = Touchpad::identify_and_resolve(channel, RetryConfig::default())
//!     .await
//!     .expect("could not identify touchpad");
//!
//! // The profile describes the generation and geometry of the touchpad.
//! let profile = touchpad.profile();
//! println!("generation {}, x up to {}", profile.generation.number(), profile.bounds.x_max);
//!
//! // Touchpads report relative motion until they are switched to absolute
//! // mode.
//! touchpad
//!     .enable_absolute_mode(&AbsoluteModeConfig::default())
//!     .await
//!     .expect("could not enable absolute mode");
//! touchpad
//!     .configure_stream(&StreamConfig::default())
//!     .await
//!     .expect("could not enable reporting");
//! ```
//!
//! ## Decode the packet stream
//!
//! The byte stream is fed into a [`mt::Decoder`] one byte at a time. It emits
//! an event for every complete packet:
//!
//! ```ignore
//! let mut decoder = touchpad.decoder();
//!
//! for byte in my_byte_stream {
//!     match decoder.on_byte(byte) {
//!         Some(PacketEvent::FingerUpdate { finger, .. }) => {
//!             println!("finger {} at {}x{}", finger.finger, finger.x, finger.y);
//!         },
//!         Some(PacketEvent::FingersSync { lifted, .. }) if lifted != 0 => {
//!             println!("lifted {lifted:05b}");
//!         },
//!         _ => {},
//!     }
//! }
//! ```
//!
//! Profiles can also be resolved without hardware from recorded query
//! replies using [`profile::resolve`].

pub use async_trait::async_trait;

pub mod channel;
pub mod config;
pub mod detect;
pub mod device;
pub mod mt;
pub mod nibble;
pub mod packet;
pub mod profile;
pub mod protocol;
pub mod register;
