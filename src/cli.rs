use std::fs;

use clap::{Parser, ValueEnum};

use vrptw_pricing::pricing::PulseParams;

#[derive(Parser, Debug)]
#[command(version)]
pub struct ProgramArguments {
    #[arg(long, help = "rng seed")]
    pub seed: Option<i128>,

    #[arg(short, long, default_value = "25", help = "customers in the generated instance")]
    pub customers: usize,

    #[arg(long, default_value = "200")]
    pub capacity: f64,

    #[arg(long, default_value = "1000")]
    pub horizon: f64,

    #[arg(long = "solver", value_enum, default_value = "pulse")]
    pub solver: SolverVariant,

    #[arg(long, default_value = "40", help = "scale of the random dual prices")]
    pub duals_scale: f64,

    #[arg(long, help = "TOML file with pulse parameters")]
    pub pulse_config: Option<String>,

    #[arg(long, help = "bucket width of the pulse bounding phase")]
    pub pulse_time_step: Option<f64>,

    #[arg(long, help = "lowest bucket time of the pulse bounding phase")]
    pub pulse_time_limit_lb: Option<f64>,

    #[arg(long, help = "pulse worker threads for the depot subtrees")]
    pub pulse_workers: Option<usize>,
}

#[derive(Clone, ValueEnum, Debug)]
pub enum SolverVariant {
    LabelSetting,
    LabelCorrecting,
    Pulse,
    All,
}

impl ProgramArguments {
    pub fn pulse_params(&self) -> anyhow::Result<PulseParams> {
        let mut params = match &self.pulse_config {
            Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
            None => PulseParams::default(),
        };
        if let Some(time_step) = self.pulse_time_step {
            params.time_step = time_step;
        }
        if let Some(time_limit_lb) = self.pulse_time_limit_lb {
            params.time_limit_lb = time_limit_lb;
        }
        if let Some(workers) = self.pulse_workers {
            params.workers = workers;
        }
        Ok(params)
    }
}
