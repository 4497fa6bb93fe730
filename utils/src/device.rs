use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no input device available\navailable devices:\n{listing}")]
    NoInputDevice { listing: String },

    #[error("no output device available\navailable devices:\n{listing}")]
    NoOutputDevice { listing: String },

    #[error("invalid device {index}: {reason}\navailable devices:\n{listing}")]
    InvalidDevice {
        index: usize,
        reason: String,
        listing: String,
    },

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

/// How to pick a device: the platform default or an index from [`DeviceCatalog::devices`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceSelector {
    #[default]
    Default,
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub input_channels: u16,
    pub input_sample_rate: u32,
    pub output_channels: u16,
    pub output_sample_rate: u32,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

/// Enumerates the audio devices of a host.
pub trait DeviceCatalog {
    fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError>;
}

/// Renders one ` * name(Nch, Rhz) [default]` line per device, in the given order.
pub fn describe_devices(devices: &[DeviceInfo]) -> String {
    devices
        .iter()
        .map(|d| {
            let (channels, rate) = if d.input_channels > 0 {
                (d.input_channels, d.input_sample_rate)
            } else {
                (d.output_channels, d.output_sample_rate)
            };
            let mut line = format!(" * {}({}ch, {}hz)", d.name, channels, rate);
            if d.is_default_input || d.is_default_output {
                line.push_str(" [default]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn resolve_input(catalog: &dyn DeviceCatalog, selector: DeviceSelector) -> Result<DeviceInfo, DeviceError> {
    let devices = catalog.devices()?;
    let listing = describe_devices(&devices);
    match selector {
        DeviceSelector::Default => devices
            .into_iter()
            .find(|d| d.is_default_input && d.input_channels > 0)
            .ok_or(DeviceError::NoInputDevice { listing }),
        DeviceSelector::Index(index) => {
            let Some(device) = devices.into_iter().find(|d| d.index == index) else {
                return Err(DeviceError::InvalidDevice {
                    index,
                    reason: "no such device".to_string(),
                    listing,
                });
            };
            if device.input_channels == 0 {
                return Err(DeviceError::InvalidDevice {
                    index,
                    reason: format!("{} has no input channels", device.name),
                    listing,
                });
            }
            Ok(device)
        }
    }
}

pub fn resolve_output(catalog: &dyn DeviceCatalog, selector: DeviceSelector) -> Result<DeviceInfo, DeviceError> {
    let devices = catalog.devices()?;
    let listing = describe_devices(&devices);
    match selector {
        DeviceSelector::Default => devices
            .into_iter()
            .find(|d| d.is_default_output && d.output_channels > 0)
            .ok_or(DeviceError::NoOutputDevice { listing }),
        DeviceSelector::Index(index) => {
            let Some(device) = devices.into_iter().find(|d| d.index == index) else {
                return Err(DeviceError::InvalidDevice {
                    index,
                    reason: "no such device".to_string(),
                    listing,
                });
            };
            if device.output_channels == 0 {
                return Err(DeviceError::InvalidDevice {
                    index,
                    reason: format!("{} has no output channels", device.name),
                    listing,
                });
            }
            Ok(device)
        }
    }
}

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// The default cpal host.
pub struct CpalCatalog {
    host: cpal::Host,
}

impl CpalCatalog {
    pub fn new() -> Self {
        let host = get_host();
        tracing::debug!("Host: {:?}", host.id());
        Self { host }
    }

    /// The cpal device behind `info`, looked up by index and checked by name.
    pub fn device(&self, info: &DeviceInfo) -> Result<Device, DeviceError> {
        let device = self
            .host
            .devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?
            .nth(info.index);
        match device {
            Some(device) if device.name().is_ok_and(|name| name == info.name) => Ok(device),
            _ => Err(DeviceError::InvalidDevice {
                index: info.index,
                reason: "device disappeared".to_string(),
                listing: self.devices().map(|d| describe_devices(&d)).unwrap_or_default(),
            }),
        }
    }
}

impl Default for CpalCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCatalog for CpalCatalog {
    fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let default_input = self.host.default_input_device().and_then(|d| d.name().ok());
        let default_output = self.host.default_output_device().and_then(|d| d.name().ok());

        let devices = self
            .host
            .devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        let mut infos = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
            let (input_channels, input_sample_rate) = device
                .default_input_config()
                .map(|c| (c.channels(), c.sample_rate().0))
                .unwrap_or((0, 0));
            let (output_channels, output_sample_rate) = device
                .default_output_config()
                .map(|c| (c.channels(), c.sample_rate().0))
                .unwrap_or((0, 0));
            infos.push(DeviceInfo {
                index,
                is_default_input: input_channels > 0 && default_input.as_deref() == Some(name.as_str()),
                is_default_output: output_channels > 0 && default_output.as_deref() == Some(name.as_str()),
                name,
                input_channels,
                input_sample_rate,
                output_channels,
                output_sample_rate,
            });
        }
        Ok(infos)
    }
}

pub fn get_available_inputs() -> Result<String, DeviceError> {
    let devices = CpalCatalog::new().devices()?;
    let inputs: Vec<DeviceInfo> = devices
        .into_iter()
        .filter(|d| d.input_channels > 0)
        .map(|d| DeviceInfo {
            is_default_output: false,
            ..d
        })
        .collect();
    Ok(describe_devices(&inputs))
}

pub fn get_available_outputs() -> Result<String, DeviceError> {
    let devices = CpalCatalog::new().devices()?;
    let outputs: Vec<DeviceInfo> = devices
        .into_iter()
        .filter(|d| d.output_channels > 0)
        .map(|d| DeviceInfo {
            input_channels: 0,
            is_default_input: false,
            ..d
        })
        .collect();
    Ok(describe_devices(&outputs))
}
