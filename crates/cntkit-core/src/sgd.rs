/// Stochastic gradient descent settings for the train action.
#[derive(Clone, Debug, PartialEq)]
pub struct SgdParams {
    /// Samples per epoch; 0 means the whole data set.
    pub epoch_size: usize,
    pub minibatch_size: usize,
    /// One rate per epoch; the last one keeps applying afterwards.
    pub learning_rates_per_mb: Vec<f64>,
    pub momentum_per_mb: f64,
    pub max_epochs: usize,
    pub dropout_rate: Option<f64>,
    /// Per-sample gradient clipping threshold, with truncation.
    pub clipping_threshold_per_sample: Option<f64>,
}

impl Default for SgdParams {
    fn default() -> Self {
        Self {
            epoch_size: 0,
            minibatch_size: 25,
            learning_rates_per_mb: vec![0.1],
            momentum_per_mb: 0.9,
            max_epochs: 1,
            dropout_rate: None,
            clipping_threshold_per_sample: None,
        }
    }
}

impl SgdParams {
    pub fn render(&self) -> String {
        let rates = self
            .learning_rates_per_mb
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(":");

        let mut lines = vec![
            "SGD = [".to_string(),
            format!("    epochSize = {}", self.epoch_size),
            format!("    minibatchSize = {}", self.minibatch_size),
            format!("    learningRatesPerMB = {rates}"),
            format!("    momentumPerMB = {}", self.momentum_per_mb),
            format!("    maxEpochs = {}", self.max_epochs),
        ];
        if let Some(rate) = self.dropout_rate {
            lines.push(format!("    dropoutRate = {rate}"));
        }
        if let Some(threshold) = self.clipping_threshold_per_sample {
            lines.push("    gradientClippingWithTruncation = true".to_string());
            lines.push(format!("    clippingThresholdPerSample = {threshold}"));
        }
        lines.push("]".to_string());
        lines.join("\n")
    }
}
