use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use patchwork::config::{load_toml, read_toml_file, SetupConfig};
use patchwork::export::{to_cbor, to_msgpack, CellField, CompositeField};
use patchwork::{AmrAttribute, BoxSplittingOptions, MeshTree};




const BUILTIN_SETUP: &str = r#"
[layout.root]
node_counts = [33, 33]
origin = [0.0, 0.0]
cell_size = [0.03125, 0.03125]

[[layout.patches]]
lo = [8, 8]
hi = [16, 24]
factors = [2, 2]

[[layout.patches]]
lo = [16, 8]
hi = [24, 24]
factors = [4, 2]

[[layout.patches]]
parent = [0]
lo = [4, 8]
hi = [16, 24]
factors = [2, 2]

[attribute]
ghost = 2

[[attribute.fields]]
name = "density"
components = 1
nature = "IntensiveMaximum"

[[attribute.fields]]
name = "momentum"
components = 2
component_names = ["px", "py"]
"#;




#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Cbor,
    Msgpack,
}




#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    /// Layout and attribute setup (TOML); a built-in one is used if omitted
    #[clap(short = 's', long)]
    setup: Option<String>,

    /// Replace the root's patches with ones built from a density criterion
    #[clap(short = 'a', long)]
    adapt: bool,

    #[clap(short = 'o', long, default_value = "layout.cbor")]
    output: String,

    #[clap(short = 'f', long, value_enum, default_value = "cbor")]
    format: Format,

    #[clap(short = 'v', long)]
    verbose: bool,
}




#[derive(serde::Serialize)]


/**
 * Everything written out: every field on every node (ghost cells included),
 * and the overlap-free composite view of every field.
 */
struct Output {
    nodes: Vec<CellField>,
    composite: Vec<CompositeField>,
}




fn density(x: [f64; 2]) -> f64 {
    let r2 = (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2);
    1.0 + (-r2 / 0.01).exp()
}




// ============================================================================
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    SimpleLogger::new()
        .with_level(if opts.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .init()?;

    let setup: SetupConfig = match &opts.setup {
        Some(path) => read_toml_file(std::path::Path::new(path))?,
        None => load_toml(BUILTIN_SETUP)?,
    };
    let mut tree = MeshTree::<2>::from_config(&setup.layout)?;

    if opts.adapt {
        let root = tree.root();
        let grid = tree.grid(root)?.clone();
        let criterion: Vec<bool> = grid
            .cell_box()
            .iter()
            .map(|i| density(grid.cell_center(i)) > 1.2)
            .collect();
        tree.create_patches_from_criterion(root, &BoxSplittingOptions::default(), &criterion, [2, 2])?;
    }

    let mut att = AmrAttribute::from_config(&tree, &setup.attribute)?;
    att.alloc()?;

    for name in att.field_names().into_iter().map(String::from).collect::<Vec<_>>() {
        att.fill_interior_with(&name, |x, v| {
            for (c, y) in v.iter_mut().enumerate() {
                *y = density(x) * (c + 1) as f64;
            }
        })?;
    }
    att.synchronize_fine_to_coarse()?;
    att.synchronize_all_ghost_zones()?;

    let probe = setup.attribute.fields.first().map(|f| f.name.as_str());

    for level in 0..tree.max_number_of_levels() {
        let nodes = tree.nodes_at_level(level);
        let mut cells = 0;
        let mut peak = f64::NEG_INFINITY;

        for &node in &nodes {
            cells += tree.number_of_cells_at_current_level(node)?;

            if let Some(name) = probe {
                peak = att.get_field_on(node, name)?.into_iter().fold(peak, f64::max);
            }
        }
        info!("level {}: {} nodes, {} cells, peak {:.4}", level, nodes.len(), cells, peak);
    }
    info!("composite mesh has {} cells", tree.number_of_cells_recursive_without_overlap(tree.root())?);

    let mut output = Output { nodes: Vec::new(), composite: Vec::new() };

    for name in att.field_names() {
        for node in tree.all_nodes() {
            output.nodes.push(att.build_cell_field_on_with_ghost(node, name)?);
        }
        output.composite.push(att.build_cell_field_on_recurse_without_overlap_without_ghost(tree.root(), name)?);
    }
    let bytes = match opts.format {
        Format::Cbor => to_cbor(&output)?,
        Format::Msgpack => to_msgpack(&output)?,
    };
    std::fs::write(&opts.output, &bytes)?;
    info!("wrote {} bytes to {}", bytes.len(), opts.output);

    Ok(())
}
