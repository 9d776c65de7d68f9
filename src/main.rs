pub mod colormap;
pub mod config;
pub mod data;
pub mod export;
pub mod form;
pub mod glyphs;
pub mod processing;
pub mod raster;
pub mod render;
pub mod server;
pub mod session;
pub mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::{ColorScale, RenderRequest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive map form
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render one map from a CSV of region values
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// CSV with the region key column and a `value` column
        #[arg(long, value_name = "FILE")]
        values: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        color_scale: Option<ColorScale>,
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Write a values CSV with every region set to zero
    Template {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "values.csv")]
        out: PathBuf,
    },
    /// Print the region names found in the boundary file
    Regions {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

/// Renders one map from a values CSV and writes it into `out_dir` under the
/// export file name. Returns the written path.
fn render_to_file(
    app_config: &AppConfig,
    values: &Path,
    title: Option<String>,
    unit: Option<String>,
    color_scale: Option<ColorScale>,
    out_dir: &Path,
) -> Result<PathBuf> {
    let key = &app_config.input.region_key;

    // 1. Load boundaries and values
    let regions = data::load_regions(&app_config.input.geojson, key)?;
    let values = data::load_values_csv(values, &regions, key)?;

    let defaults = &app_config.defaults;
    let request = RenderRequest {
        title: title.unwrap_or_else(|| defaults.title.clone()),
        unit: unit.unwrap_or_else(|| defaults.unit.clone()),
        color_scale: color_scale.unwrap_or(defaults.color_scale),
        values,
    };

    // 2. Join, render, encode
    let png = export::render_png(&regions, &request, app_config.render.width, app_config.render.height)?;

    // 3. Write
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;
    let path = out_dir.join(export::export_filename(&request.title));
    fs::write(&path, &png).with_context(|| format!("Failed to write {:?}", path))?;
    info!(?path, bytes = png.len(), "Map written");
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!(?config, "Serving map form");
            let app_config = config::AppConfig::load_from_file(&config)?;

            // Boundaries are read once and shared by every session.
            let regions = Arc::new(data::load_regions(&app_config.input.geojson, &app_config.input.region_key)?);

            server::start_server(app_config, regions).await?;
        }
        Commands::Render {
            config,
            values,
            title,
            unit,
            color_scale,
            out_dir,
        } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            render_to_file(&app_config, &values, title, unit, color_scale, &out_dir)?;
        }
        Commands::Template { config, out } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let key = &app_config.input.region_key;
            let regions = data::load_regions(&app_config.input.geojson, key)?;

            let file = File::create(&out).with_context(|| format!("Failed to create {:?}", out))?;
            data::write_template(file, &regions, key)?;
            info!(?out, regions = regions.len(), "Template written");
        }
        Commands::Regions { config } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let regions = data::load_regions(&app_config.input.geojson, &app_config.input.region_key)?;
            for name in regions.names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"st_nm": "Kerala"},
             "geometry": {"type": "Polygon", "coordinates": [[[75.0,8.5],[77.0,8.5],[77.0,12.5],[75.0,12.5],[75.0,8.5]]]}},
            {"type": "Feature", "properties": {"st_nm": "Tamil Nadu"},
             "geometry": {"type": "Polygon", "coordinates": [[[77.0,8.5],[80.0,8.5],[80.0,13.5],[77.0,13.5],[77.0,8.5]]]}}
        ]
    }"#;

    #[test]
    fn render_writes_png_named_after_the_title() {
        let dir = tempfile::tempdir().unwrap();
        let geojson = dir.path().join("states.geojson");
        fs::write(&geojson, STATES).unwrap();
        let values = dir.path().join("values.csv");
        fs::write(&values, "st_nm,value\nKerala,94\nTamil Nadu,80\n").unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            format!("[input]\ngeojson = {:?}\n[render]\nwidth = 320\nheight = 300\n", geojson),
        )
        .unwrap();

        let app_config = AppConfig::load_from_file(&config_path).unwrap();
        let out_dir = dir.path().join("out/maps");
        let path = render_to_file(
            &app_config,
            &values,
            Some("Literacy Rate".to_string()),
            None,
            Some(ColorScale::Greens),
            &out_dir,
        )
        .unwrap();

        assert_eq!(path, out_dir.join(export::export_filename("Literacy Rate")));
        assert_eq!(path, out_dir.join("Literacy_Rate.png"));
        let png = fs::read(&path).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 300));
    }

    #[test]
    fn render_falls_back_to_default_title_and_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let geojson = dir.path().join("states.geojson");
        fs::write(&geojson, STATES).unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, format!("[input]\ngeojson = {:?}\n", geojson)).unwrap();
        let app_config = AppConfig::load_from_file(&config_path).unwrap();

        let values = dir.path().join("values.csv");
        fs::write(&values, "st_nm,value\nKerala,12\n").unwrap();
        let path = render_to_file(&app_config, &values, None, None, None, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("India_Thematic_Map.png"));
        assert!(path.exists());

        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "st_nm,value\nKerala,-3\n").unwrap();
        let out_dir = dir.path().join("never");
        assert!(render_to_file(&app_config, &bad, None, None, None, &out_dir).is_err());
        assert!(!out_dir.exists());
    }
}
