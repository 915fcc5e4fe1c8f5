//! `.nnet` fully-connected ReLU networks.
//!
//! Format: `//` comment lines, then comma-separated numbers in this order:
//!
//! 1. `num_layers, input_size, output_size, max_layer_size`
//! 2. `num_layers + 1` layer sizes
//! 3. a symmetric flag (ignored)
//! 4. input minimums, input maximums (`input_size` each)
//! 5. means and ranges (`input_size + 1` each; the last entry is for outputs)
//! 6. per layer: weight rows (`out` rows of `in` values), then `out` biases
//!
//! Inputs are clamped to `[min, max]` and normalized as `(x - mean) / range`.
//! Outputs are left unnormalized; only their ordering matters here.

use crate::io::read_text_maybe_gzip;
use crate::NnetError;
use ndarray::{Array1, Array2, ArrayView1};
use std::path::Path;
use tracing::debug;

/// One dense layer: `y = W x + b`.
#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// A loaded `.nnet` network.
#[derive(Debug, Clone)]
pub struct NnetNetwork {
    layers: Vec<DenseLayer>,
    input_min: Array1<f64>,
    input_max: Array1<f64>,
    input_mean: Array1<f64>,
    input_range: Array1<f64>,
}

struct Tokens {
    values: Vec<f64>,
    pos: usize,
}

impl Tokens {
    fn parse(text: &str) -> Result<Self, NnetError> {
        let mut values = Vec::new();
        let body = text
            .lines()
            .skip_while(|line| line.trim_start().starts_with("//"));
        for line in body {
            for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let v = token.parse::<f64>().map_err(|_| NnetError::Parse {
                    token: token.to_string(),
                    position: values.len(),
                })?;
                values.push(v);
            }
        }
        Ok(Self { values, pos: 0 })
    }

    fn take(&mut self, n: usize) -> Result<&[f64], NnetError> {
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= self.values.len() => end,
            Some(end) => {
                return Err(NnetError::Truncated {
                    needed: end - self.values.len(),
                })
            }
            None => return Err(NnetError::Format(format!("count {n} overflows"))),
        };
        let slice = &self.values[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_size(&mut self) -> Result<usize, NnetError> {
        let v = self.take(1)?[0];
        if v < 0.0 || v.fract() != 0.0 {
            return Err(NnetError::Format(format!("expected a size, got {v}")));
        }
        // No size can exceed the number of values in the file
        if v > self.values.len() as f64 {
            return Err(NnetError::Format(format!(
                "size {v} exceeds the {} values in the file",
                self.values.len()
            )));
        }
        Ok(v as usize)
    }

    fn take_array(&mut self, n: usize) -> Result<Array1<f64>, NnetError> {
        Ok(Array1::from(self.take(n)?.to_vec()))
    }
}

impl NnetNetwork {
    /// Load from a `.nnet` or `.nnet.gz` file.
    pub fn load(path: &Path) -> Result<Self, NnetError> {
        let text = read_text_maybe_gzip(path)?;
        let net = Self::parse(&text)?;
        debug!(
            "Loaded {} ({} layers, {} inputs, {} outputs)",
            path.display(),
            net.num_layers(),
            net.input_size(),
            net.output_size()
        );
        Ok(net)
    }

    /// Parse `.nnet` text.
    pub fn parse(text: &str) -> Result<Self, NnetError> {
        let mut tokens = Tokens::parse(text)?;

        let num_layers = tokens.take_size()?;
        let input_size = tokens.take_size()?;
        let output_size = tokens.take_size()?;
        let _max_layer_size = tokens.take_size()?;
        if num_layers == 0 {
            return Err(NnetError::Format("network has no layers".to_string()));
        }

        let mut sizes = Vec::with_capacity(num_layers + 1);
        for _ in 0..=num_layers {
            sizes.push(tokens.take_size()?);
        }
        if sizes[0] != input_size || sizes[num_layers] != output_size {
            return Err(NnetError::Format(format!(
                "layer sizes {:?} disagree with input {} / output {}",
                sizes, input_size, output_size
            )));
        }

        let _symmetric = tokens.take(1)?;
        let input_min = tokens.take_array(input_size)?;
        let input_max = tokens.take_array(input_size)?;
        let means = tokens.take_array(input_size + 1)?;
        let ranges = tokens.take_array(input_size + 1)?;
        if ranges.iter().take(input_size).any(|&r| r == 0.0) {
            return Err(NnetError::Format("zero input range".to_string()));
        }

        let mut layers = Vec::with_capacity(num_layers);
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let count = fan_in.checked_mul(fan_out).ok_or_else(|| {
                NnetError::Format(format!("layer {fan_in}x{fan_out} overflows"))
            })?;
            let flat = tokens.take(count)?.to_vec();
            let weights = Array2::from_shape_vec((fan_out, fan_in), flat)
                .map_err(|e| NnetError::Format(e.to_string()))?;
            let bias = tokens.take_array(fan_out)?;
            layers.push(DenseLayer { weights, bias });
        }

        if tokens.pos != tokens.values.len() {
            return Err(NnetError::Format(format!(
                "{} trailing values after the last layer",
                tokens.values.len() - tokens.pos
            )));
        }

        Ok(Self {
            layers,
            input_min,
            input_max,
            input_mean: means.slice(ndarray::s![..input_size]).to_owned(),
            input_range: ranges.slice(ndarray::s![..input_size]).to_owned(),
        })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_size(&self) -> usize {
        self.input_min.len()
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.bias.len())
    }

    /// Forward pass on raw (unnormalized) inputs.
    pub fn evaluate(&self, input: ArrayView1<f64>) -> Result<Array1<f64>, NnetError> {
        if input.len() != self.input_size() {
            return Err(NnetError::InputSize {
                expected: self.input_size(),
                got: input.len(),
            });
        }
        Ok(self.forward(input))
    }

    /// Forward pass without the size check.
    pub(crate) fn forward(&self, input: ArrayView1<f64>) -> Array1<f64> {
        let mut x = Array1::from_shape_fn(input.len(), |i| {
            let v = input[i].clamp(self.input_min[i], self.input_max[i]);
            (v - self.input_mean[i]) / self.input_range[i]
        });

        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.weights.dot(&x) + &layer.bias;
            if i != last {
                x.mapv_inplace(|v| v.max(0.0));
            }
        }
        x
    }
}
