use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::{Antialiasing, FaultPolicy, ShaderStage};

#[derive(Parser, Debug)]
#[command(
    name = "meshspin",
    author,
    version,
    about = "Spin a GLSL-shaded mesh in a window or headless"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a scene and drive its frame loop.
    Run(RunArgs),
    /// Compile a single shader stage, or build every program of a scene, without a GPU.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scene directory or `scene.toml` path.
    #[arg(value_name = "SCENE", env = "MESHSPIN_SCENE")]
    pub scene: Option<PathBuf>,

    /// Window or surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Record frames with the headless backend instead of opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Frames to render in headless mode.
    #[arg(long, value_name = "N", default_value_t = 60)]
    pub frames: u32,

    /// Simulated refresh rate of the headless clock.
    #[arg(long, value_name = "FPS", default_value_t = 60)]
    pub fps: u32,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias, default_value = "off")]
    pub antialias: Antialiasing,

    /// Run program validation even in release builds.
    #[arg(long, conflicts_with = "no_validate")]
    pub validate: bool,

    /// Skip program validation even in debug builds.
    #[arg(long)]
    pub no_validate: bool,

    /// Seconds per turn of the primary rotation, overriding the scene.
    #[arg(long, value_name = "SECONDS", value_parser = parse_period)]
    pub period: Option<f64>,

    /// What to do when a frame fails: `skip` or `stop`.
    #[arg(long, value_name = "POLICY", value_parser = parse_fault_policy, default_value = "skip")]
    pub on_fault: FaultPolicy,
}

impl RunArgs {
    pub fn validate_programs(&self) -> bool {
        if self.validate {
            true
        } else if self.no_validate {
            false
        } else {
            cfg!(debug_assertions)
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Shader source, or a scene directory / `scene.toml` when `--stage` is omitted.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Stage to compile FILE as: `vertex` or `fragment`.
    #[arg(long, value_name = "STAGE", value_parser = parse_stage)]
    pub stage: Option<ShaderStage>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Err("anti-alias mode must not be empty".to_string()),
        "auto" | "max" => Ok(Antialiasing::Auto),
        "off" | "none" | "0" | "1" => Ok(Antialiasing::Off),
        _ => match normalized.parse::<u32>() {
            Ok(samples @ (2 | 4 | 8 | 16)) => Ok(Antialiasing::Samples(samples)),
            Ok(samples) => Err(format!(
                "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
            )),
            Err(_) => Err(format!(
                "invalid anti-alias mode '{}'; use auto/off or 2/4/8/16",
                value.trim()
            )),
        },
    }
}

pub fn parse_period(value: &str) -> Result<f64, String> {
    let period: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid period '{}'", value.trim()))?;
    if !(period.is_finite() && period > 0.0) {
        return Err("rotation period must be a positive number of seconds".to_string());
    }
    Ok(period)
}

pub fn parse_fault_policy(value: &str) -> Result<FaultPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "skip" | "skip-frame" => Ok(FaultPolicy::SkipFrame),
        "stop" => Ok(FaultPolicy::Stop),
        other => Err(format!("unknown fault policy '{other}'; expected skip or stop")),
    }
}

pub fn parse_stage(value: &str) -> Result<ShaderStage, String> {
    value.parse::<ShaderStage>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_surface_size(" 640 X 480 "), Ok((640, 480)));
        assert!(parse_surface_size("1280").is_err());
        assert!(parse_surface_size("0x720").is_err());
    }

    #[test]
    fn parses_antialias_modes() {
        assert_eq!(parse_antialias("auto"), Ok(Antialiasing::Auto));
        assert_eq!(parse_antialias("OFF"), Ok(Antialiasing::Off));
        assert_eq!(parse_antialias("4"), Ok(Antialiasing::Samples(4)));
        assert!(parse_antialias("3").unwrap_err().contains("unsupported"));
        assert!(parse_antialias("lots").is_err());
    }

    #[test]
    fn stage_names_are_strict() {
        assert_eq!(parse_stage("fragment"), Ok(ShaderStage::Fragment));
        let err = parse_stage("geometry").unwrap_err();
        assert!(err.contains("expected vertex or fragment"), "{err}");
    }

    #[test]
    fn validation_flags_override_build_default() {
        let cli = Cli::parse_from(["meshspin", "run", "scene", "--no-validate"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(!args.validate_programs());
        assert_eq!(args.on_fault, FaultPolicy::SkipFrame);

        let cli = Cli::parse_from(["meshspin", "run", "scene", "--validate", "--on-fault", "stop"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.validate_programs());
        assert_eq!(args.on_fault, FaultPolicy::Stop);
    }
}
