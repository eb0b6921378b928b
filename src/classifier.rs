//! Classifier boundary and score post-processing.
//!
//! Inference itself happens behind the `Classifier` trait: a feature vector
//! goes in, one raw score per class comes out. Softmax, display rounding and
//! thresholding are done here and in the engines.

use crate::error::ClassifierError;

pub trait Classifier {
    /// Feature vector length the model was trained on.
    fn input_len(&self) -> usize;

    /// Raw per-class scores for `input`.
    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn input_len(&self) -> usize {
        (**self).input_len()
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        (**self).infer(input)
    }
}

/// Rejects inputs whose length differs from what the model expects.
pub fn check_input(expected: usize, input: &[f32]) -> Result<(), ClassifierError> {
    if input.len() != expected {
        return Err(ClassifierError::SizeMismatch {
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}

/// Adapts a closure into a size-checked `Classifier`.
pub struct FnClassifier<F> {
    input_len: usize,
    f: F,
}

impl<F> FnClassifier<F>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    pub fn new(input_len: usize, f: F) -> Self {
        Self { input_len, f }
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        check_input(self.input_len, input)?;
        Ok((self.f)(input))
    }
}

/// Post-processed classifier output for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub raw: Vec<f32>,
    pub probabilities: Vec<f32>,
    /// Probabilities rounded to two decimals, for display only.
    pub rounded: Vec<f32>,
}

impl Scores {
    pub fn from_raw(raw: Vec<f32>) -> Self {
        let probabilities = softmax(&raw);
        let rounded = probabilities.iter().map(|p| round2(*p)).collect();
        Self {
            raw,
            probabilities,
            rounded,
        }
    }

    /// Index and probability of the most likely class; ties go to the lowest index.
    pub fn best(&self) -> Option<(usize, f32)> {
        argmax(&self.probabilities).map(|i| (i, self.probabilities[i]))
    }
}

pub fn softmax(raw: &[f32]) -> Vec<f32> {
    // shifting by the max keeps exp() finite; the result is unchanged
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = raw.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= *v => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_of_three_class_scores() {
        let s = Scores::from_raw(vec![0.0, 5.0, 1.0]);
        let expected = [0.00657, 0.97555, 0.01788];
        for (p, e) in s.probabilities.iter().zip(expected) {
            assert!((p - e).abs() < 1e-4, "{:?}", s.probabilities);
        }
        assert_eq!(s.rounded, vec![0.01, 0.98, 0.02]);
        assert_eq!(s.best().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn softmax_survives_large_scores() {
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert!((p[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn closure_classifier_checks_size() {
        let mut c = FnClassifier::new(3, |x: &[f32]| x.to_vec());
        assert_eq!(c.infer(&[1.0, 2.0, 3.0]), Ok(vec![1.0, 2.0, 3.0]));
        assert_eq!(
            c.infer(&[1.0]),
            Err(ClassifierError::SizeMismatch {
                expected: 3,
                actual: 1
            })
        );
    }
}
