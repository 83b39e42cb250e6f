use std::{fmt, num::NonZeroUsize, str::FromStr, thread};

use ndarray::ArrayD;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::Result;

/// Where a segment runs its forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// A single thread.
    Cpu,
    /// A dedicated rayon pool that splits every convolution's output channels.
    Parallel { threads: NonZeroUsize },
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Parallel { threads } => write!(f, "parallel({threads} threads)"),
        }
    }
}

/// The device requested by the configuration, resolved once by `Device::select`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Parallel(Option<NonZeroUsize>),
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "parallel" => Ok(Self::Parallel(None)),
            other => {
                let threads = other
                    .strip_prefix("parallel:")
                    .ok_or_else(|| format!("unknown device: {other}"))?;

                threads
                    .parse()
                    .map(|threads| Self::Parallel(Some(threads)))
                    .map_err(|e| format!("invalid thread count {threads:?}: {e}"))
            }
        }
    }
}

impl Device {
    /// Resolves a preference into a concrete device.
    ///
    /// `Auto` picks the parallel device whenever the host reports more than one core.
    ///
    /// # Arguments
    /// * `preference` - The configured device preference.
    ///
    /// # Returns
    /// The device every segment of this process runs on.
    pub fn select(preference: DevicePreference) -> Self {
        let cores = thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);

        match preference {
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Auto if cores.get() == 1 => Device::Cpu,
            DevicePreference::Auto | DevicePreference::Parallel(None) => {
                Device::Parallel { threads: cores }
            }
            DevicePreference::Parallel(Some(threads)) => Device::Parallel { threads },
        }
    }
}

/// Runs work on a device, owning the thread pool if the device needs one.
pub(crate) struct Executor {
    device: Device,
    pool: Option<ThreadPool>,
}

impl Executor {
    /// Creates a new `Executor`.
    ///
    /// # Arguments
    /// * `device` - The device to run on.
    ///
    /// # Returns
    /// A new `Executor` or an error if the thread pool couldn't be started.
    pub(crate) fn new(device: Device) -> Result<Self> {
        let pool = match device {
            Device::Cpu => None,
            Device::Parallel { threads } => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads.get())
                    .thread_name(|i| format!("forward-{i}"))
                    .build()?,
            ),
        };

        Ok(Self { device, pool })
    }

    pub(crate) fn device(&self) -> Device {
        self.device
    }

    /// Runs `op`, inside the pool if there is one.
    pub(crate) fn run<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// A tensor tagged with the device it was placed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    array: ArrayD<f32>,
    device: Device,
}

impl Tensor {
    /// Wraps an array living on the host `Cpu` device.
    pub fn new(array: ArrayD<f32>) -> Self {
        Self {
            array,
            device: Device::Cpu,
        }
    }

    /// Places the tensor on `device`.
    pub fn to(self, device: Device) -> Self {
        Self { device, ..self }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn array(&self) -> &ArrayD<f32> {
        &self.array
    }

    pub fn into_array(self) -> ArrayD<f32> {
        self.array
    }
}
