//! Public value types exchanged with callers.
//!
//! These are plain owned values: `Clone` is a deep copy, so two holders of the
//! "same" parameters never observe each other's mutation. Each type has a
//! provider-side counterpart in [`crate::provider`]; conversions live in
//! [`crate::marshal`].

/// Width and height of a video frame or display surface, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raw audio capture/encode parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioParams {
    pub codec: String,
    /// Samples per second (e.g. 8000, 16000).
    pub sample_rate: i32,
    /// Bits per sample.
    pub sample_size: i32,
    pub channels: i32,
}

impl AudioParams {
    pub fn new(codec: &str, sample_rate: i32, sample_size: i32, channels: i32) -> Self {
        Self {
            codec: codec.to_string(),
            sample_rate,
            sample_size,
            channels,
        }
    }
}

/// Raw video capture/encode parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoParams {
    pub codec: String,
    pub size: Size,
    pub fps: i32,
}

impl VideoParams {
    pub fn new(codec: &str, size: Size, fps: i32) -> Self {
        Self {
            codec: codec.to_string(),
            size,
            fps,
        }
    }
}

/// A single `name=value` format parameter of a payload type.
///
/// Names are case-sensitive (XEP-0167).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PayloadParameter {
    pub name: String,
    pub value: String,
}

impl PayloadParameter {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// A negotiated codec instance: an RTP payload type with its attributes.
///
/// Every numeric field defaults to `-1` ("unspecified"). A payload whose `id`
/// is `-1` is the null payload.
///
/// Equality compares `parameters` as an unordered collection, so two payloads
/// listing the same parameters in a different order are equal. Everything else,
/// including parameter name case, must match exactly.
#[derive(Debug, Clone)]
pub struct PayloadInfo {
    pub id: i32,
    pub name: String,
    pub clockrate: i32,
    pub channels: i32,
    /// Preferred packet duration in milliseconds.
    pub ptime: i32,
    pub maxptime: i32,
    pub parameters: Vec<PayloadParameter>,
}

impl PayloadInfo {
    pub fn new(id: i32, name: &str, clockrate: i32, channels: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            clockrate,
            channels,
            ..Self::default()
        }
    }

    /// Builder-style helper appending one format parameter.
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.push(PayloadParameter::new(name, value));
        self
    }

    pub fn is_null(&self) -> bool {
        self.id == -1
    }
}

impl Default for PayloadInfo {
    fn default() -> Self {
        Self {
            id: -1,
            name: String::new(),
            clockrate: -1,
            channels: -1,
            ptime: -1,
            maxptime: -1,
            parameters: Vec::new(),
        }
    }
}

impl PartialEq for PayloadInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.clockrate == other.clockrate
            && self.channels == other.channels
            && self.ptime == other.ptime
            && self.maxptime == other.maxptime
            && same_parameters(&self.parameters, &other.parameters)
    }
}

impl Eq for PayloadInfo {}

/// Multiset comparison: every parameter in `a` is matched by a distinct one in `b`.
fn same_parameters(a: &[PayloadParameter], b: &[PayloadParameter]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut unmatched: Vec<&PayloadParameter> = b.iter().collect();
    for p in a {
        match unmatched.iter().position(|q| *q == p) {
            Some(pos) => {
                unmatched.swap_remove(pos);
            }
            None => return false,
        }
    }
    true
}

/// Kind of media device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    #[default]
    AudioIn,
    AudioOut,
    VideoIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeviceInfo {
    kind: DeviceKind,
    id: String,
    name: String,
}

/// A capture or playback device reported by the provider.
///
/// The null device (`Device::null()`, also the `Default`) means "no device
/// selected"; its accessors return empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Device {
    info: Option<DeviceInfo>,
}

impl Device {
    pub fn new(kind: DeviceKind, id: &str, name: &str) -> Self {
        Self {
            info: Some(DeviceInfo {
                kind,
                id: id.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.info.is_none()
    }

    pub fn kind(&self) -> DeviceKind {
        self.info.as_ref().map(|i| i.kind).unwrap_or_default()
    }

    /// Provider-specific identifier, passed back to the `set_*_device` calls.
    pub fn id(&self) -> &str {
        self.info.as_ref().map(|i| i.id.as_str()).unwrap_or("")
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        self.info.as_ref().map(|i| i.name.as_str()).unwrap_or("")
    }
}
