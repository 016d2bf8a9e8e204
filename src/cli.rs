use crate::config::StageConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarnessArgs {
    pub fixture: Option<PathBuf>,
    pub frames: Option<u64>,
    seed: Option<u64>,
    shot_max: Option<usize>,
    item_max: Option<usize>,
    pub write_output: Option<PathBuf>,
    pub golden: Option<PathBuf>,
    pub help: bool,
}

impl HarnessArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = HarnessArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if flag == "--help" || flag == "-h" {
                parsed.help = true;
                continue;
            }
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name <value>.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "fixture" => parsed.fixture = Some(PathBuf::from(value)),
                "frames" => {
                    parsed.frames = Some(value.parse::<u64>().with_context(|| format!("Invalid frames '{value}'"))?);
                }
                "seed" => {
                    parsed.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "shot-max" => {
                    parsed.shot_max =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid shot-max '{value}'"))?);
                }
                "item-max" => {
                    parsed.item_max =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid item-max '{value}'"))?);
                }
                "write-output" => parsed.write_output = Some(PathBuf::from(value)),
                "golden" => parsed.golden = Some(PathBuf::from(value)),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --fixture, --frames, --seed, --shot-max, --item-max, --write-output, --golden."
                ),
            }
        }
        Ok(parsed)
    }

    pub fn config_overrides(&self) -> StageConfigOverrides {
        StageConfigOverrides { shot_max: self.shot_max, item_max: self.item_max, seed: self.seed }
    }
}
