//! Resolves the capabilities and geometry of a touchpad.
//!
//! Everything in here is free of I/O. The raw query replies are collected in a
//! [`DeviceQueries`] (either by [`crate::device::Touchpad`] or from a recorded
//! description) and turned into a [`DeviceProfile`] by [`resolve`].

use thiserror::Error;

use crate::{
    nibble::U4,
    protocol::{CommandDialect, FirmwareVersion, HardwareGeneration, Opcode, UnknownHardware},
};

/// The resolution in dots per millimetre assumed until the device reports
/// its own.
pub const DEFAULT_RESOLUTION: u32 = 31;

const V1_BOUNDS: CoordinateBounds = CoordinateBounds {
    x_min: 32,
    x_max: 544,
    y_min: 32,
    y_max: 352,
};

const V2_BOUNDS: CoordinateBounds = CoordinateBounds {
    x_min: 8,
    x_max: 1144,
    y_min: 8,
    y_max: 760,
};

/// V2 firmwares reporting the fixed [`V2_BOUNDS`].
const V2_FIXED_BOUNDS_FIRMWARES: [u32; 3] = [0x020800, 0x020b00, 0x020030];

/// The raw replies of every query the resolver may need.
///
/// Which of the optional replies are required depends on the generation, see
/// [`DeviceQueries::needs_firmware_id`], [`DeviceQueries::needs_dpi_samples`]
/// and [`DeviceQueries::needs_resolution`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceQueries {
    /// The reply to the firmware version query.
    pub firmware_version: [u8; 3],

    /// The reply to the capabilities query.
    pub capabilities: [u8; 3],

    /// The reply to the sample query. V1 does not support it and reports
    /// zeroes.
    pub samples: [u8; 3],

    /// The reply to the firmware ID query.
    pub firmware_id: Option<[u8; 3]>,

    /// The reply to the second sample query issued by fixed-DPI V2 devices.
    pub dpi_samples: Option<[u8; 3]>,

    /// The reply to the V4 resolution query.
    pub resolution: Option<[u8; 3]>,
}

impl DeviceQueries {
    /// The packed firmware version.
    pub fn firmware(&self) -> FirmwareVersion {
        FirmwareVersion::from_bytes(self.firmware_version)
    }

    /// Whether the bounds of the given generation are derived from the
    /// firmware ID query.
    pub fn needs_firmware_id(&self, generation: HardwareGeneration) -> bool {
        match generation {
            HardwareGeneration::V1 => false,
            HardwareGeneration::V2 => {
                !V2_FIXED_BOUNDS_FIRMWARES.contains(&self.firmware().as_u32())
            },
            HardwareGeneration::V3 | HardwareGeneration::V4 => true,
        }
    }

    /// Whether a V2 device scales its maxima by a second sample query.
    ///
    /// This can only be decided once the firmware ID is known.
    pub fn needs_dpi_samples(&self, generation: HardwareGeneration) -> bool {
        let Some(firmware_id) = self.firmware_id else {
            return false;
        };

        generation == HardwareGeneration::V2
            && self.needs_firmware_id(generation)
            && self.firmware_version[0] == 0x14
            && firmware_id[1] & 0x10 != 0
    }

    /// Whether the generation reports its own resolution.
    pub fn needs_resolution(&self, generation: HardwareGeneration) -> bool {
        generation == HardwareGeneration::V4
    }
}

/// The resolved, immutable description of a touchpad.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProfile {
    /// The hardware generation.
    pub generation: HardwareGeneration,

    /// The firmware version.
    pub firmware_version: FirmwareVersion,

    /// The dialect capability queries are framed in.
    pub dialect: CommandDialect,

    /// The raw capability bytes.
    pub capabilities: [u8; 3],

    /// The raw sample bytes.
    pub samples: [u8; 3],

    /// Whether V4 packets are protected by a CRC instead of constant bits.
    pub crc_enabled: bool,

    /// The coordinate range of the touch surface.
    pub bounds: CoordinateBounds,

    /// The resolution in dots per millimetre.
    pub resolution: Resolution,

    /// The trace layout of the sensor. Only known on V4.
    pub traces: Option<TraceGeometry>,

    /// The bus byte reported by the V4 resolution query.
    pub bus: Option<u8>,

    /// Firmware-specific behavior.
    pub quirks: Quirks,
}

impl DeviceProfile {
    /// The IC body version of the firmware.
    pub fn ic_body(&self) -> U4 {
        self.firmware_version.ic_body()
    }

    /// Derives the ranges a downstream input layer publishes.
    pub fn input_range(&self) -> InputRange {
        InputRange {
            logical_x: self.bounds.x_max - self.bounds.x_min,
            logical_y: self.bounds.y_max - self.bounds.y_min,
            physical_x_mm: (self.bounds.x_max + 1) / self.resolution.x.max(1),
            physical_y_mm: (self.bounds.y_max + 1) / self.resolution.y.max(1),
        }
    }
}

/// The coordinate range of the touch surface.
///
/// A resolved range always satisfies `x_max > x_min` and `y_max > y_min`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateBounds {
    /// The smallest reported X coordinate.
    pub x_min: u32,

    /// The largest reported X coordinate.
    pub x_max: u32,

    /// The smallest reported Y coordinate.
    pub y_min: u32,

    /// The largest reported Y coordinate.
    pub y_max: u32,
}

impl CoordinateBounds {
    /// Packs the maxima from a V3/V4 firmware ID reply.
    ///
    /// The low nibble of the first byte extends the X maximum, the high
    /// nibble the Y maximum.
    pub fn from_firmware_id(firmware_id: [u8; 3]) -> Self {
        Self {
            x_min: 0,
            x_max: U4::from_lo(firmware_id[0]).above_byte(firmware_id[1]).into(),
            y_min: 0,
            y_max: U4::from_hi(firmware_id[0]).above_byte(firmware_id[2]).into(),
        }
    }

    fn from_maxima(x_max: i32, y_max: i32) -> Result<Self, GeometryError> {
        match (u32::try_from(x_max), u32::try_from(y_max)) {
            (Ok(x_max), Ok(y_max)) => Ok(Self {
                x_min: 0,
                x_max,
                y_min: 0,
                y_max,
            }),
            _ => Err(GeometryError::EmptyBounds),
        }
    }

    fn is_empty(&self) -> bool {
        self.x_max <= self.x_min || self.y_max <= self.y_min
    }
}

/// The resolution of the touch surface in dots per millimetre.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// The horizontal resolution.
    pub x: u32,

    /// The vertical resolution.
    pub y: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            x: DEFAULT_RESOLUTION,
            y: DEFAULT_RESOLUTION,
        }
    }
}

/// The trace layout of a V4 sensor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceGeometry {
    /// The amount of column traces.
    pub x_traces: u8,

    /// The amount of row traces, if the reported value was plausible.
    pub y_traces: Option<u8>,

    /// The distance between two column traces in coordinate units.
    pub width: u32,
}

impl TraceGeometry {
    /// Derives the trace layout from the capability bytes.
    ///
    /// The column count must lie within `2..=x_max`. An implausible row count
    /// is dropped silently.
    pub fn resolve(
        capabilities: [u8; 3],
        bounds: &CoordinateBounds,
    ) -> Result<Self, GeometryError> {
        let x_traces = capabilities[1];
        if x_traces < 2 || u32::from(x_traces) > bounds.x_max {
            return Err(GeometryError::ColumnTraces {
                traces: x_traces,
                x_max: bounds.x_max,
            });
        }

        let y_traces = capabilities[2];
        let y_traces = (y_traces >= 2 && u32::from(y_traces) <= bounds.y_max).then_some(y_traces);

        Ok(Self {
            x_traces,
            y_traces,
            width: bounds.x_max / u32::from(x_traces - 1),
        })
    }
}

/// Firmware-specific behavior downstream consumers may want to know about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quirks {
    /// Whether a trackpoint is attached to the touchpad and its packets are
    /// interleaved with touchpad packets.
    pub has_trackpoint: bool,

    /// Whether the firmware misreports coordinates when a touch starts.
    pub jumpy_cursor: bool,

    /// Whether packets carry meaningful pressure values.
    pub reports_pressure: bool,
}

impl Quirks {
    fn detect(
        generation: HardwareGeneration,
        firmware: FirmwareVersion,
        capabilities: [u8; 3],
    ) -> Self {
        Self {
            has_trackpoint: capabilities[0] & 0x80 != 0,
            jumpy_cursor: matches!(firmware.as_u32(), 0x020022 | 0x020600),
            reports_pressure: generation != HardwareGeneration::V1
                && firmware.as_u32() >= 0x020800,
        }
    }
}

/// The ranges a downstream input layer publishes for the touchpad.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputRange {
    /// The logical X range in coordinate units.
    pub logical_x: u32,

    /// The logical Y range in coordinate units.
    pub logical_y: u32,

    /// The physical width in millimetres.
    pub physical_x_mm: u32,

    /// The physical height in millimetres.
    pub physical_y_mm: u32,
}

/// Converts a resolution code reported by the firmware to dots per
/// millimetre.
///
/// The firmware reports `dpi = code * 10 + 790`. The conversion to dots per
/// millimetre stays in integer arithmetic and truncates.
pub fn convert_resolution(code: U4) -> u32 {
    (u32::from(code) * 10 + 790) * 10 / 254
}

/// Fails if the firmware is known to have a broken absolute mode.
pub fn check_absolute_mode(
    generation: HardwareGeneration,
    samples: [u8; 3],
) -> Result<(), GeometryError> {
    if generation == HardwareGeneration::V3 && samples[1] == 0x74 {
        return Err(GeometryError::BrokenAbsoluteMode);
    }

    Ok(())
}

/// Resolves a complete [`DeviceProfile`] from raw query replies.
pub fn resolve(queries: &DeviceQueries) -> Result<DeviceProfile, ResolveError> {
    let firmware = queries.firmware();
    let generation = HardwareGeneration::from_firmware(firmware)?;

    check_absolute_mode(generation, queries.samples)?;

    let bounds = resolve_bounds(generation, queries)?;
    if bounds.is_empty() {
        return Err(GeometryError::EmptyBounds.into());
    }

    let traces = match generation {
        HardwareGeneration::V4 => Some(TraceGeometry::resolve(queries.capabilities, &bounds)?),
        HardwareGeneration::V1 | HardwareGeneration::V2 | HardwareGeneration::V3 => None,
    };

    let (resolution, bus) = match (generation, queries.resolution) {
        (HardwareGeneration::V4, Some(reply)) => (
            Resolution {
                x: convert_resolution(U4::from_lo(reply[1])),
                y: convert_resolution(U4::from_hi(reply[1])),
            },
            Some(reply[2]),
        ),
        _ => (Resolution::default(), None),
    };

    Ok(DeviceProfile {
        generation,
        firmware_version: firmware,
        dialect: generation.dialect(),
        capabilities: queries.capabilities,
        samples: queries.samples,
        crc_enabled: firmware.crc_enabled(),
        bounds,
        resolution,
        traces,
        bus,
        quirks: Quirks::detect(generation, firmware, queries.capabilities),
    })
}

fn resolve_bounds(
    generation: HardwareGeneration,
    queries: &DeviceQueries,
) -> Result<CoordinateBounds, GeometryError> {
    let firmware_id = || {
        queries
            .firmware_id
            .ok_or(GeometryError::MissingQuery(Opcode::FirmwareIdQuery))
    };

    match generation {
        HardwareGeneration::V1 => Ok(V1_BOUNDS),
        HardwareGeneration::V2 => {
            if !queries.needs_firmware_id(generation) {
                return Ok(V2_BOUNDS);
            }

            resolve_v2_bounds(queries, firmware_id()?)
        },
        HardwareGeneration::V3 | HardwareGeneration::V4 => {
            Ok(CoordinateBounds::from_firmware_id(firmware_id()?))
        },
    }
}

fn resolve_v2_bounds(
    queries: &DeviceQueries,
    firmware_id: [u8; 3],
) -> Result<CoordinateBounds, GeometryError> {
    let firmware = queries.firmware().as_u32();
    let offset = if firmware > 0x020800 && firmware < 0x020900 {
        1
    } else {
        2
    };

    let traces_x = i32::from(queries.capabilities[1]) - offset;
    let traces_y = i32::from(queries.capabilities[2]) - offset;

    if queries.firmware_version[0] == 0x14 && firmware_id[1] & 0x10 != 0 {
        let dpi = queries
            .dpi_samples
            .ok_or(GeometryError::MissingQuery(Opcode::SampleQuery))?;

        return CoordinateBounds::from_maxima(
            traces_x * i32::from(dpi[1]) / 2,
            traces_y * i32::from(dpi[2]) / 2,
        );
    }

    match firmware {
        0x040216 => CoordinateBounds::from_maxima(819, 405),
        0x040219 | 0x040215 => CoordinateBounds::from_maxima(900, 500),
        _ => CoordinateBounds::from_maxima(traces_x * 64, traces_y * 64),
    }
}

/// Represents an error that occurred when resolving the touch surface
/// geometry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum GeometryError {
    /// Indicates a V3 firmware whose absolute mode is known to be broken.
    #[error("the firmware is known to have a broken absolute mode")]
    BrokenAbsoluteMode,

    /// Indicates an implausible amount of column traces.
    #[error("{traces} column traces do not fit an X maximum of {x_max}")]
    ColumnTraces { traces: u8, x_max: u32 },

    /// Indicates that the resolved coordinate range is empty.
    #[error("the resolved coordinate range is empty")]
    EmptyBounds,

    /// Indicates that the reply to a required query is missing.
    #[error("the reply to the {0:?} query is missing")]
    MissingQuery(Opcode),
}

/// Represents an error that occurred when resolving a [`DeviceProfile`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ResolveError {
    /// Indicates that the firmware maps to no known hardware generation.
    #[error(transparent)]
    UnknownHardware(#[from] UnknownHardware),

    /// Indicates that the geometry could not be resolved.
    #[error("the touch surface geometry could not be resolved")]
    Geometry(#[from] GeometryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(firmware_version: [u8; 3]) -> DeviceQueries {
        DeviceQueries {
            firmware_version,
            ..Default::default()
        }
    }

    #[test]
    fn resolution_conversion_truncates() {
        assert_eq!(convert_resolution(U4::from_lo(0)), 31);
        assert_eq!(convert_resolution(U4::from_lo(1)), 31);
        assert_eq!(convert_resolution(U4::from_lo(2)), 31);
        assert_eq!(convert_resolution(U4::from_lo(3)), 32);
        assert_eq!(convert_resolution(U4::from_lo(15)), 37);
    }

    #[test]
    fn v1_uses_constant_bounds() {
        let profile = resolve(&queries([0x02, 0x00, 0x22])).unwrap();

        assert_eq!(profile.generation, HardwareGeneration::V1);
        assert_eq!(profile.bounds, V1_BOUNDS);
        assert_eq!(profile.resolution, Resolution::default());
        assert!(profile.quirks.jumpy_cursor);
        assert!(!profile.quirks.reports_pressure);
    }

    #[test]
    fn v2_fixed_firmwares_skip_firmware_id() {
        let q = queries([0x02, 0x0b, 0x00]);
        assert!(!q.needs_firmware_id(HardwareGeneration::V2));
        assert_eq!(resolve(&q).unwrap().bounds, V2_BOUNDS);
    }

    #[test]
    fn v2_bounds_from_capabilities() {
        let mut q = queries([0x02, 0x08, 0x10]);
        q.capabilities = [0x00, 0x12, 0x0c];
        q.firmware_id = Some([0x00, 0x00, 0x00]);

        // 0x020810 lies between 0x020800 and 0x020900, the offset is 1.
        let bounds = resolve(&q).unwrap().bounds;
        assert_eq!((bounds.x_max, bounds.y_max), ((0x12 - 1) * 64, (0x0c - 1) * 64));

        q.firmware_version = [0x04, 0x01, 0x00];
        let bounds = resolve(&q).unwrap().bounds;
        assert_eq!((bounds.x_max, bounds.y_max), ((0x12 - 2) * 64, (0x0c - 2) * 64));
    }

    #[test]
    fn v2_firmware_overrides() {
        let mut q = queries([0x04, 0x02, 0x16]);
        q.capabilities = [0x00, 0x12, 0x0c];
        q.firmware_id = Some([0x00, 0x00, 0x00]);
        let bounds = resolve(&q).unwrap().bounds;
        assert_eq!((bounds.x_max, bounds.y_max), (819, 405));

        for firmware in [[0x04, 0x02, 0x19], [0x04, 0x02, 0x15]] {
            q.firmware_version = firmware;
            let bounds = resolve(&q).unwrap().bounds;
            assert_eq!((bounds.x_max, bounds.y_max), (900, 500));
        }
    }

    #[test]
    fn v2_fixed_dpi_scales_by_samples() {
        let mut q = queries([0x14, 0x01, 0x00]);
        q.capabilities = [0x00, 0x12, 0x0c];
        q.firmware_id = Some([0x00, 0x10, 0x00]);
        assert!(q.needs_dpi_samples(HardwareGeneration::V2));
        assert_eq!(
            resolve(&q),
            Err(ResolveError::Geometry(GeometryError::MissingQuery(
                Opcode::SampleQuery
            )))
        );

        q.dpi_samples = Some([0x00, 0x0a, 0x08]);
        let bounds = resolve(&q).unwrap().bounds;
        assert_eq!((bounds.x_max, bounds.y_max), (16 * 10 / 2, 10 * 8 / 2));
    }

    #[test]
    fn v2_underflowing_capabilities_are_rejected() {
        let mut q = queries([0x04, 0x01, 0x00]);
        q.capabilities = [0x00, 0x01, 0x0c];
        q.firmware_id = Some([0x00, 0x00, 0x00]);

        assert_eq!(
            resolve(&q),
            Err(ResolveError::Geometry(GeometryError::EmptyBounds))
        );
    }

    #[test]
    fn v3_packs_maxima_from_firmware_id() {
        let mut q = queries([0x15, 0x05, 0x00]);
        q.firmware_id = Some([0x3c, 0x01, 0xff]);

        let profile = resolve(&q).unwrap();
        assert_eq!(profile.generation, HardwareGeneration::V3);
        assert_eq!(profile.dialect, CommandDialect::DirectElan);
        assert_eq!((profile.bounds.x_max, profile.bounds.y_max), (0x0c01, 0x03ff));
        assert_eq!(profile.traces, None);
    }

    #[test]
    fn v3_broken_absolute_mode_is_fatal() {
        let mut q = queries([0x15, 0x05, 0x00]);
        q.samples = [0x00, 0x74, 0x00];
        q.firmware_id = Some([0x3c, 0x01, 0xff]);

        assert_eq!(
            resolve(&q),
            Err(ResolveError::Geometry(GeometryError::BrokenAbsoluteMode))
        );
    }

    #[test]
    fn v4_trace_geometry() {
        let mut q = queries([0x46, 0x0f, 0x01]);
        q.capabilities = [0x10, 0x14, 0x0c];
        q.firmware_id = Some([0x25, 0x00, 0x80]);
        q.resolution = Some([0x00, 0x21, 0x07]);

        let profile = resolve(&q).unwrap();
        assert_eq!((profile.bounds.x_max, profile.bounds.y_max), (0x0500, 0x0280));
        assert_eq!(
            profile.traces,
            Some(TraceGeometry {
                x_traces: 0x14,
                y_traces: Some(0x0c),
                width: 0x0500 / 19,
            })
        );
        assert_eq!(profile.resolution, Resolution { x: 31, y: 31 });
        assert_eq!(profile.bus, Some(0x07));
        assert!(!profile.crc_enabled);
        assert!(profile.quirks.reports_pressure);
        assert!(!profile.quirks.has_trackpoint);
    }

    #[test]
    fn v4_column_traces_out_of_range() {
        let mut q = queries([0x46, 0x0f, 0x01]);
        q.firmware_id = Some([0x00, 0x10, 0x10]);

        for traces in [0, 1, 0x11] {
            q.capabilities = [0x00, traces, 0x08];
            assert_eq!(
                resolve(&q),
                Err(ResolveError::Geometry(GeometryError::ColumnTraces {
                    traces,
                    x_max: 0x10,
                }))
            );
        }
    }

    #[test]
    fn v4_implausible_row_traces_are_dropped() {
        let mut q = queries([0x46, 0x0f, 0x01]);
        q.firmware_id = Some([0x00, 0x10, 0x10]);

        for rows in [0, 1, 0x11] {
            q.capabilities = [0x00, 0x08, rows];
            let traces = resolve(&q).unwrap().traces.unwrap();
            assert_eq!(traces.y_traces, None);
            assert_eq!(traces.width, 0x10 / 7);
        }
    }

    #[test]
    fn input_range_uses_resolution() {
        let profile = resolve(&queries([0x02, 0x00, 0x22])).unwrap();
        assert_eq!(profile.input_range(), InputRange {
            logical_x: 544 - 32,
            logical_y: 352 - 32,
            physical_x_mm: 545 / 31,
            physical_y_mm: 353 / 31,
        });
    }
}
