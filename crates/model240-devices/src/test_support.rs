//! Instrumented fakes for session and service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::device::{DeviceError, DeviceFactory, Model240, Result};
use crate::devices::MockModel240;
use crate::types::{
    Brightness, Channel, ChannelStatus, CurveDataPoint, CurveHeader, CurveIndex, Identification,
    InputParameter,
};

/// Knobs for [`ProbedDevice`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions {
    /// Time each call spends inside the device
    pub delay: Duration,
    /// Name of the call that fails with a communication error
    pub fail_on: Option<&'static str>,
}

/// Records every device call and detects overlapping calls
#[derive(Debug, Default)]
pub struct CallProbe {
    calls: Mutex<Vec<&'static str>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    overlaps: AtomicUsize,
}

impl CallProbe {
    fn enter(self: &Arc<Self>, name: &'static str) -> ActiveCall {
        self.calls.lock().unwrap().push(name);
        let before = self.active.fetch_add(1, Ordering::SeqCst);
        if before > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.max_active.fetch_max(before + 1, Ordering::SeqCst);
        ActiveCall(self.clone())
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls with the given name
    pub fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    /// Calls whose names start with `set_`
    pub fn writes(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("set_"))
            .collect()
    }

    /// Highest number of calls observed inside the device at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Number of calls that started while another was running
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

struct ActiveCall(Arc<CallProbe>);

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`MockModel240`] wrapped in a [`CallProbe`]
#[derive(Debug)]
pub struct ProbedDevice {
    inner: MockModel240,
    probe: Arc<CallProbe>,
    options: ProbeOptions,
}

impl ProbedDevice {
    /// Wrap `inner`, recording into `probe`
    pub fn new(inner: MockModel240, probe: Arc<CallProbe>, options: ProbeOptions) -> Self {
        Self {
            inner,
            probe,
            options,
        }
    }

    fn call<T>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut MockModel240) -> Result<T>,
    ) -> Result<T> {
        let _active = self.probe.enter(name);
        if !self.options.delay.is_zero() {
            std::thread::sleep(self.options.delay);
        }
        if self.options.fail_on == Some(name) {
            return Err(DeviceError::communication(format!("{} failed", name)));
        }
        f(&mut self.inner)
    }
}

impl Model240 for ProbedDevice {
    fn identification(&mut self) -> Result<Identification> {
        self.call("identification", |d| d.identification())
    }

    fn input_parameter(&mut self, channel: Channel) -> Result<InputParameter> {
        self.call("input_parameter", |d| d.input_parameter(channel))
    }

    fn set_input_parameter(&mut self, channel: Channel, parameter: &InputParameter) -> Result<()> {
        self.call("set_input_parameter", |d| d.set_input_parameter(channel, parameter))
    }

    fn sensor_name(&mut self, channel: Channel) -> Result<String> {
        self.call("sensor_name", |d| d.sensor_name(channel))
    }

    fn set_sensor_name(&mut self, channel: Channel, name: &str) -> Result<()> {
        self.call("set_sensor_name", |d| d.set_sensor_name(channel, name))
    }

    fn filter(&mut self, channel: Channel) -> Result<String> {
        self.call("filter", |d| d.filter(channel))
    }

    fn set_filter(&mut self, channel: Channel, filter: &str) -> Result<()> {
        self.call("set_filter", |d| d.set_filter(channel, filter))
    }

    fn celsius_reading(&mut self, channel: Channel) -> Result<f64> {
        self.call("celsius_reading", |d| d.celsius_reading(channel))
    }

    fn fahrenheit_reading(&mut self, channel: Channel) -> Result<f64> {
        self.call("fahrenheit_reading", |d| d.fahrenheit_reading(channel))
    }

    fn kelvin_reading(&mut self, channel: Channel) -> Result<f64> {
        self.call("kelvin_reading", |d| d.kelvin_reading(channel))
    }

    fn sensor_reading(&mut self, channel: Channel) -> Result<f64> {
        self.call("sensor_reading", |d| d.sensor_reading(channel))
    }

    fn channel_status(&mut self, channel: Channel) -> Result<ChannelStatus> {
        self.call("channel_status", |d| d.channel_status(channel))
    }

    fn curve_header(&mut self, channel: Channel) -> Result<CurveHeader> {
        self.call("curve_header", |d| d.curve_header(channel))
    }

    fn set_curve_header(&mut self, channel: Channel, header: &CurveHeader) -> Result<()> {
        self.call("set_curve_header", |d| d.set_curve_header(channel, header))
    }

    fn curve_data_point(&mut self, channel: Channel, index: CurveIndex) -> Result<CurveDataPoint> {
        self.call("curve_data_point", |d| d.curve_data_point(channel, index))
    }

    fn set_curve_data_point(
        &mut self,
        channel: Channel,
        index: CurveIndex,
        point: CurveDataPoint,
    ) -> Result<()> {
        self.call("set_curve_data_point", |d| {
            d.set_curve_data_point(channel, index, point)
        })
    }

    fn module_name(&mut self) -> Result<String> {
        self.call("module_name", |d| d.module_name())
    }

    fn set_module_name(&mut self, name: &str) -> Result<()> {
        self.call("set_module_name", |d| d.set_module_name(name))
    }

    fn brightness(&mut self) -> Result<Brightness> {
        self.call("brightness", |d| d.brightness())
    }

    fn set_brightness(&mut self, brightness: Brightness) -> Result<()> {
        self.call("set_brightness", |d| d.set_brightness(brightness))
    }

    fn disconnect(&mut self) -> Result<()> {
        self.call("disconnect", |d| d.disconnect())
    }
}

/// Factory handing out [`ProbedDevice`]s that share one probe
#[derive(Clone)]
pub struct FakeFactory {
    probe: Arc<CallProbe>,
    options: ProbeOptions,
    prepare: Option<fn(&mut MockModel240)>,
    fail: bool,
    open_delay: Duration,
    opening: Arc<AtomicUsize>,
    /// Highest number of `open` calls running at once
    pub max_concurrent_opens: Arc<AtomicUsize>,
    /// Number of successful opens
    pub opened: Arc<AtomicUsize>,
}

impl FakeFactory {
    /// A factory whose devices behave per `options`
    pub fn new(options: ProbeOptions) -> Self {
        Self {
            probe: Arc::new(CallProbe::default()),
            options,
            prepare: None,
            fail: false,
            open_delay: Duration::ZERO,
            opening: Arc::new(AtomicUsize::new(0)),
            max_concurrent_opens: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A factory whose `open` always fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(ProbeOptions::default())
        }
    }

    /// A factory whose `open` takes `delay` to finish
    pub fn slow_open(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::new(ProbeOptions::default())
        }
    }

    /// Adjust every mock before it is handed out
    pub fn prepared(mut self, prepare: fn(&mut MockModel240)) -> Self {
        self.prepare = Some(prepare);
        self
    }

    /// The probe shared by every device this factory opens
    pub fn probe(&self) -> Arc<CallProbe> {
        self.probe.clone()
    }
}

impl std::fmt::Debug for FakeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeFactory")
            .field("options", &self.options)
            .field("fail", &self.fail)
            .field("open_delay", &self.open_delay)
            .finish()
    }
}

impl DeviceFactory for FakeFactory {
    fn open(&self) -> Result<Box<dyn Model240>> {
        let before = self.opening.fetch_add(1, Ordering::SeqCst);
        self.max_concurrent_opens
            .fetch_max(before + 1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        self.opening.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(DeviceError::communication("no instrument attached"));
        }
        let mut inner = MockModel240::new();
        if let Some(prepare) = self.prepare {
            prepare(&mut inner);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ProbedDevice::new(
            inner,
            self.probe.clone(),
            self.options,
        )))
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}
