//! Deterministic fakes for the capability traits.
#![allow(dead_code)]

use ratiopix_core::{
    AutoThresholdMethod, CalibrationBar, DisplayRange, Error, ImageEncoder, Lut, MetadataService,
    PixelOps, Result, RgbImage, SeriesDecoder, ThresholdPair, ThresholdPrompt, ThresholdRequest,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Counts stacks alive at any moment.
#[derive(Clone, Default)]
pub struct LiveCounter(Rc<Cell<i64>>);

impl LiveCounter {
    pub fn get(&self) -> i64 {
        self.0.get()
    }
}

struct Live(Rc<Cell<i64>>);

impl Live {
    fn new(counter: &Rc<Cell<i64>>) -> Self {
        counter.set(counter.get() + 1);
        Self(Rc::clone(counter))
    }
}

impl Clone for Live {
    fn clone(&self) -> Self {
        Self::new(&self.0)
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// A stack of flat channels.
#[derive(Clone)]
pub struct FakeStack {
    pub channels: Vec<Vec<f32>>,
    pub inverted: bool,
    pub title: String,
    _live: Live,
}

impl FakeStack {
    pub fn new(counter: &LiveCounter, channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            inverted: false,
            title: String::new(),
            _live: Live::new(&counter.0),
        }
    }

    fn derive(&self, channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            inverted: false,
            title: String::new(),
            _live: self._live.clone(),
        }
    }
}

/// Pixel ops on flat vectors; can be told to fail at a named step.
#[derive(Default)]
pub struct FakeOps {
    pub fail_at: Option<&'static str>,
}

impl FakeOps {
    pub fn failing_at(step: &'static str) -> Self {
        Self {
            fail_at: Some(step),
        }
    }

    fn step(&self, name: &str) -> Result<()> {
        if self.fail_at == Some(name) {
            return Err(Error::Processing(format!("injected failure in {name}")));
        }
        Ok(())
    }

    fn zip(a: &FakeStack, b: &FakeStack, f: impl Fn(f32, f32) -> f32) -> Vec<Vec<f32>> {
        vec![a.channels[0]
            .iter()
            .zip(b.channels[0].iter())
            .map(|(x, y)| f(*x, *y))
            .collect()]
    }
}

impl PixelOps for FakeOps {
    type Stack = FakeStack;

    fn set_title(&self, stack: &mut FakeStack, title: &str) {
        stack.title = title.to_string();
    }

    fn align_channels(&self, _stack: &mut FakeStack, _max_shift: usize) -> Result<()> {
        self.step("align")
    }

    fn to_float(&self, _stack: &mut FakeStack) -> Result<()> {
        self.step("float")
    }

    fn gaussian_blur(&self, _stack: &mut FakeStack, _sigma: f64) -> Result<()> {
        self.step("blur")
    }

    fn duplicate_channel(&self, stack: &FakeStack, channel: usize) -> Result<FakeStack> {
        self.step("duplicate")?;
        let plane = stack
            .channels
            .get(channel - 1)
            .cloned()
            .ok_or_else(|| Error::Processing(format!("no channel {channel}")))?;
        Ok(stack.derive(vec![plane]))
    }

    fn subtract_background(&self, _stack: &mut FakeStack, _radius: f64) -> Result<()> {
        self.step("background")
    }

    fn laplacian(&self, stack: &FakeStack, _smoothing: f64) -> Result<FakeStack> {
        self.step("laplacian")?;
        Ok(stack.derive(stack.channels.clone()))
    }

    fn auto_threshold(
        &self,
        stack: &FakeStack,
        method: AutoThresholdMethod,
        _dark_background: bool,
    ) -> Result<ThresholdPair> {
        self.step("threshold")?;
        let max = stack.channels[0]
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f32::MIN, f32::max);
        Ok(match method {
            AutoThresholdMethod::Moments => ThresholdPair::new(0.5, f64::from(max)),
            AutoThresholdMethod::Default => ThresholdPair::new(1.0, f64::from(max)),
        })
    }

    fn convert_to_mask(
        &self,
        stack: &mut FakeStack,
        pair: ThresholdPair,
        black_background: bool,
    ) -> Result<()> {
        self.step("mask")?;
        for v in &mut stack.channels[0] {
            *v = if pair.contains(f64::from(*v)) { 255.0 } else { 0.0 };
        }
        stack.inverted = !black_background;
        Ok(())
    }

    fn is_inverted_lut(&self, stack: &FakeStack) -> bool {
        stack.inverted
    }

    fn invert_lut(&self, stack: &mut FakeStack) {
        stack.inverted = !stack.inverted;
    }

    fn nan_background(&self, stack: &mut FakeStack, pair: ThresholdPair) -> Result<()> {
        self.step("nan")?;
        for v in &mut stack.channels[0] {
            if !pair.contains(f64::from(*v)) {
                *v = f32::NAN;
            }
        }
        Ok(())
    }

    fn divide_scalar(&self, stack: &mut FakeStack, value: f32) -> Result<()> {
        self.step("scale")?;
        for v in &mut stack.channels[0] {
            *v /= value;
        }
        Ok(())
    }

    fn divide(&self, a: &FakeStack, b: &FakeStack) -> Result<FakeStack> {
        self.step("divide")?;
        Ok(a.derive(Self::zip(a, b, |x, y| x / y)))
    }

    fn multiply(&self, a: &FakeStack, b: &FakeStack) -> Result<FakeStack> {
        self.step("multiply")?;
        Ok(a.derive(Self::zip(a, b, |x, y| x * y)))
    }

    fn apply_lut(&self, _stack: &mut FakeStack, _lut: Lut) {}

    fn select_none(&self, _stack: &mut FakeStack) {}

    fn set_display_range(&self, _stack: &mut FakeStack, _range: DisplayRange) {}

    fn add_calibration_bar(&self, _stack: &mut FakeStack, _bar: &CalibrationBar) -> Result<()> {
        self.step("calibration")
    }

    fn value_range(&self, stack: &FakeStack) -> Option<(f32, f32)> {
        let values = &stack.channels[0];
        let lo = values.iter().copied().fold(f32::MAX, f32::min);
        let hi = values.iter().copied().fold(f32::MIN, f32::max);
        Some((lo, hi))
    }

    fn flatten(&self, stack: &FakeStack) -> Result<RgbImage> {
        self.step("flatten")?;
        Ok(RgbImage::filled(stack.channels[0].len(), 1, [0, 0, 0]))
    }
}

/// Prompt that answers with a fixed sequence of pairs and counts calls.
pub struct ScriptedPrompt {
    answers: Vec<ThresholdPair>,
    pub calls: usize,
    pub labels: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: Vec<ThresholdPair>) -> Self {
        Self {
            answers,
            calls: 0,
            labels: Vec::new(),
        }
    }
}

impl ThresholdPrompt<FakeStack> for ScriptedPrompt {
    fn request_threshold(&mut self, request: ThresholdRequest<'_, FakeStack>) -> Result<ThresholdPair> {
        let answer = self
            .answers
            .get(self.calls)
            .copied()
            .ok_or_else(|| Error::Prompt("no scripted answer left".into()))?;
        self.calls += 1;
        self.labels.push(request.label.to_string());
        Ok(answer)
    }
}

/// Metadata keyed by file name: series count, or `None` for a corrupt file.
pub struct FakeMetadata(pub HashMap<String, Option<usize>>);

impl FakeMetadata {
    fn lookup(&self, path: &Path) -> Result<usize> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match self.0.get(name) {
            Some(Some(count)) => Ok(*count),
            _ => Err(Error::metadata(path, "unreadable header")),
        }
    }
}

impl MetadataService for FakeMetadata {
    fn series_count(&self, path: &Path) -> Result<usize> {
        self.lookup(path)
    }

    fn resolution_count(&self, path: &Path, _series: usize) -> Result<usize> {
        self.lookup(path).map(|_| 1)
    }
}

/// Decoder producing constant two-channel stacks. Records how many stacks
/// were alive each time a series was opened.
pub struct FakeDecoder {
    pub counter: LiveCounter,
    pub live_at_open: RefCell<Vec<i64>>,
    pub fail_series: Option<usize>,
}

impl FakeDecoder {
    pub fn new(counter: &LiveCounter) -> Self {
        Self {
            counter: counter.clone(),
            live_at_open: RefCell::new(Vec::new()),
            fail_series: None,
        }
    }
}

impl SeriesDecoder for FakeDecoder {
    type Stack = FakeStack;

    fn open_series(&self, path: &Path, absolute_index: usize) -> Result<FakeStack> {
        self.live_at_open.borrow_mut().push(self.counter.get());
        if self.fail_series == Some(absolute_index) {
            return Err(Error::import(path, absolute_index, "bad strip"));
        }
        Ok(FakeStack::new(
            &self.counter,
            vec![vec![4.0, 4.0, 4.0, 0.0], vec![2.0, 2.0, 2.0, 2.0]],
        ))
    }
}

/// Encoder that only records destination paths.
#[derive(Default)]
pub struct RecordingEncoder {
    pub written: RefCell<Vec<PathBuf>>,
}

impl ImageEncoder for RecordingEncoder {
    type Stack = FakeStack;

    fn write_image(&self, _stack: &FakeStack, path: &Path) -> Result<()> {
        self.written.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn write_rgb(&self, _image: &RgbImage, path: &Path) -> Result<()> {
        self.written.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}
