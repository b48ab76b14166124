//! Synthetic SIMBA sensor feed
//!
//! Emits JSON-line `SensorReading`s for all nine fused channels, stamped with
//! the wall clock at emission so the guardian sees them as fresh. A scenario
//! drives one hazard in after the onset point:
//! - `normal`: steady drilling
//! - `vibration`: drill-string vibration ramps up to an emergency
//! - `overheat`: hydraulic and motor temperatures climb
//! - `void`: drilling resistance collapses for a stretch
//! - `pressure_loss`: hydraulic pressure bleeds away
//!
//! # Usage
//! ```bash
//! ./simulation --scenario overheat --seconds 120 | ./simba-guardian
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use simba_guardian::types::{SensorReading, SensorType};

// ============================================================================
// Machine Constants
// ============================================================================

/// Rotation speed while drilling (rpm)
const BASE_RPM: f64 = 120.0;
/// Motor current under normal load (A), also the resistance proxy
const BASE_CURRENT: f64 = 100.0;
/// Drill-string vibration in competent rock (g)
const BASE_VIBRATION: f64 = 1.2;
/// Hydraulic pressure (bar)
const BASE_PRESSURE: f64 = 220.0;
/// Hydraulic oil temperature (°C)
const BASE_TEMP_HYDRAULIC: f64 = 50.0;
/// Motor winding temperature (°C)
const BASE_TEMP_MOTOR: f64 = 60.0;
/// Acoustic level at the operator station (dB)
const BASE_ACOUSTIC: f64 = 90.0;
/// Electrical power draw (kW)
const BASE_POWER: f64 = 45.0;
/// Penetration rate (m/min)
const BASE_FEED_RATE: f64 = 1.2;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
enum Scenario {
    Normal,
    Vibration,
    Overheat,
    Void,
    PressureLoss,
}

#[derive(Parser, Debug)]
#[command(name = "simulation")]
#[command(about = "Synthetic SIMBA sensor feed for SIMBA Guardian testing")]
#[command(version)]
struct Args {
    /// Hazard scenario to play out
    #[arg(long, value_enum, default_value = "normal")]
    scenario: Scenario,

    /// Simulated duration in seconds
    #[arg(long, default_value = "60")]
    seconds: u32,

    /// Samples per second for every channel
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=1000))]
    rate: u32,

    /// Time compression (1 = real-time, 10 = 10x faster, 0 = no pacing)
    #[arg(long, default_value = "1")]
    speed: u32,

    /// Fraction of the run before the scenario hazard starts
    #[arg(long, default_value = "0.5")]
    onset: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the run log on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Machine State
// ============================================================================

struct Machine {
    scenario: Scenario,
    onset: f64,
    rng: StdRng,
    noise: Normal<f64>,
    depth_m: f64,
    hazard_logged: bool,
}

/// One tick's channel values.
struct Sample {
    rpm: f64,
    current_a: f64,
    vibration_g: f64,
    depth_m: f64,
    pressure_bar: f64,
    temp_hydraulic_c: f64,
    temp_motor_c: f64,
    acoustic_db: f64,
    power_kw: f64,
}

impl Machine {
    fn new(scenario: Scenario, onset: f64, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            scenario,
            onset: onset.clamp(0.0, 1.0),
            rng,
            noise: Normal::new(0.0, 1.0)?,
            depth_m: 0.0,
            hazard_logged: false,
        })
    }

    /// Gaussian noise with the given standard deviation.
    fn jitter(&mut self, sigma: f64) -> f64 {
        self.noise.sample(&mut self.rng) * sigma
    }

    /// 0 before onset, rising linearly to 1 at the end of the run.
    fn ramp(&self, progress: f64) -> f64 {
        if progress < self.onset || self.onset >= 1.0 {
            0.0
        } else {
            (progress - self.onset) / (1.0 - self.onset)
        }
    }

    fn step(&mut self, progress: f64, dt_secs: f64) -> Sample {
        let ramp = self.ramp(progress);

        let mut feed_rate = BASE_FEED_RATE;
        let mut current = BASE_CURRENT + self.jitter(2.0);
        let mut vibration = BASE_VIBRATION + self.jitter(0.08);
        let mut pressure = BASE_PRESSURE + self.jitter(3.0);
        let mut temp_hydraulic = BASE_TEMP_HYDRAULIC + self.jitter(0.3);
        let mut temp_motor = BASE_TEMP_MOTOR + self.jitter(0.3);

        match self.scenario {
            Scenario::Normal => {}
            Scenario::Vibration => vibration += ramp * 6.5,
            Scenario::Overheat => {
                temp_hydraulic += ramp * 65.0;
                temp_motor += ramp * 52.0;
            }
            Scenario::Void => {
                // Open cavity for the first third of the hazard stretch
                if ramp > 0.0 && ramp < 0.33 {
                    current = BASE_CURRENT * 0.2 + self.jitter(1.0);
                    vibration *= 0.6;
                    feed_rate *= 4.0;
                }
            }
            Scenario::PressureLoss => pressure -= ramp * 85.0,
        }

        self.depth_m += feed_rate / 60.0 * dt_secs;

        Sample {
            rpm: BASE_RPM + self.jitter(1.5),
            current_a: current.max(0.0),
            vibration_g: vibration.max(0.0),
            depth_m: self.depth_m,
            pressure_bar: pressure.max(0.0),
            temp_hydraulic_c: temp_hydraulic,
            temp_motor_c: temp_motor,
            acoustic_db: BASE_ACOUSTIC + self.jitter(1.0),
            power_kw: BASE_POWER * current / BASE_CURRENT + self.jitter(0.5),
        }
    }

    fn quality(&mut self) -> f64 {
        (0.97 + self.jitter(0.01)).clamp(0.0, 1.0)
    }

    fn readings(&mut self, sample: &Sample) -> Vec<SensorReading> {
        let now = Utc::now();
        let channels = [
            ("rpm_1", SensorType::Rpm, sample.rpm, "rpm"),
            ("current_1", SensorType::Current, sample.current_a, "A"),
            ("vibration_1", SensorType::Vibration, sample.vibration_g, "g"),
            ("depth_1", SensorType::Depth, sample.depth_m, "m"),
            ("pressure_1", SensorType::Pressure, sample.pressure_bar, "bar"),
            (
                "temp_hydraulic_1",
                SensorType::TemperatureHydraulic,
                sample.temp_hydraulic_c,
                "C",
            ),
            ("temp_motor_1", SensorType::TemperatureMotor, sample.temp_motor_c, "C"),
            ("acoustic_1", SensorType::Acoustic, sample.acoustic_db, "dB"),
            ("power_1", SensorType::Power, sample.power_kw, "kW"),
        ];
        channels
            .into_iter()
            .map(|(id, sensor_type, value, unit)| {
                SensorReading::new(id, sensor_type, value, unit)
                    .at(now)
                    .with_quality(self.quality())
            })
            .collect()
    }
}

fn log_run(quiet: bool, message: &str) {
    if !quiet {
        eprintln!("[simulation] {message}");
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let mut machine = Machine::new(args.scenario, args.onset, args.seed)?;

    let total_steps = u64::from(args.seconds) * u64::from(args.rate);
    let dt_secs = 1.0 / f64::from(args.rate);
    let interval_real = if args.speed == 0 {
        None
    } else {
        Some(Duration::from_secs_f64(dt_secs / f64::from(args.speed)))
    };

    log_run(
        args.quiet,
        &format!(
            "scenario={:?} seconds={} rate={}Hz speed={} onset={:.0}%",
            args.scenario,
            args.seconds,
            args.rate,
            args.speed,
            machine.onset * 100.0
        ),
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    for step in 0..total_steps {
        let started = Instant::now();
        let progress = step as f64 / total_steps.max(1) as f64;

        if !machine.hazard_logged && args.scenario != Scenario::Normal && progress >= machine.onset {
            machine.hazard_logged = true;
            log_run(args.quiet, &format!("hazard onset at {:.1}s", step as f64 * dt_secs));
        }

        let sample = machine.step(progress, dt_secs);
        for reading in machine.readings(&sample) {
            match serde_json::to_string(&reading) {
                Ok(line) => {
                    if writeln!(out, "{line}").is_err() {
                        // Downstream closed the pipe
                        return Ok(());
                    }
                }
                Err(e) => log_run(args.quiet, &format!("failed to encode reading: {e}")),
            }
        }
        out.flush()?;

        if let Some(interval) = interval_real {
            let elapsed = started.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    log_run(args.quiet, &format!("done, {total_steps} samples per channel"));
    Ok(())
}
