use clap::{Parser, ValueEnum};

// VCM always runs full MIS regardless of this setting; it only applies to Pt
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    Pt,
    Vcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NextEventEstimation {
    Off,
    NoMis,
    WithMis,
}

#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub max_bounces: u32,
    pub integration_seconds: f32,
    pub vcm_radius_factor: f32,
    pub vcm_radius_alpha: f32,
    pub rays_per_pixel: u32,
    pub worker_count: usize,
    pub nee: NextEventEstimation,
    // russian-roulette floor: bounces below this always survive
    pub min_bounces: u32,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            max_bounces: 10,
            integration_seconds: 30.0,
            vcm_radius_factor: 0.005,
            vcm_radius_alpha: 0.75,
            rays_per_pixel: 256,
            worker_count: 8,
            nee: NextEventEstimation::WithMis,
            min_bounces: 3,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "vcmtrace", about = "Offline Monte-Carlo path tracer core")]
pub struct Cli {
    #[arg(long, default_value = "cornell")]
    pub scene: String,

    #[arg(long, default_value_t = 512)]
    pub width: u32,

    #[arg(long, default_value_t = 512)]
    pub height: u32,

    #[arg(short, long, default_value = "out.png")]
    pub output: String,

    #[arg(long)]
    pub seconds: Option<f32>,

    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long, value_enum, default_value_t = Variant::Vcm)]
    pub variant: Variant,

    #[arg(long, value_enum, default_value_t = NextEventEstimation::WithMis)]
    pub nee: NextEventEstimation,
}

impl Cli {
    pub fn to_config(&self) -> TracingConfig {
        let mut config = TracingConfig::default();
        if let Some(seconds) = self.seconds {
            config.integration_seconds = seconds;
        }
        if let Some(threads) = self.threads {
            config.worker_count = threads.max(1);
        }
        config.nee = self.nee;
        config
    }
}
