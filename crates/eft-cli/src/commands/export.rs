use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use eft_scale::{export, from_json_slice, read_model, write_export, ExportFormat, Translations};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Scaling-model document.
    #[arg(long)]
    pub model: PathBuf,
    /// Output shape: json, legacy, text, table or latex.
    #[arg(long, default_value = "text")]
    pub format: ExportFormat,
    /// JSON object mapping parameter names to display names.
    #[arg(long)]
    pub translate: Option<PathBuf>,
    /// Output file; printed to stdout when omitted. The format's usual
    /// extension is added when the path has none.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let model = read_model(&args.model)?;
    let translations: Translations = match &args.translate {
        Some(path) => from_json_slice(&fs::read(path)?)?,
        None => Translations::new(),
    };
    match &args.out {
        Some(path) => {
            let path = if path.extension().is_none() {
                path.with_extension(args.format.extension())
            } else {
                path.clone()
            };
            write_export(&path, &model, args.format, &translations)?;
            tracing::info!(format = ?args.format, out = %path.display(), "wrote export");
        }
        None => println!("{}", export(&model, args.format, &translations)?),
    }
    Ok(())
}
