mod display;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tableau_solver::{
    BranchAndBound, CutRule, CuttingPlane, DualityVerdict, Knapsack, Model, Sensitivity, SolutionStatus, Solver,
    Tableau,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tableau")]
#[command(about = "Simplex tableau engine for linear and integer programs", long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Pivot ceiling per simplex phase
    #[arg(long, global = true, default_value_t = 10000)]
    max_iterations: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the LP relaxation with the primal or dual simplex
    Solve {
        /// The model file
        file: PathBuf,
    },
    /// Solve an integer program by branch and bound
    BranchAndBound {
        /// The model file
        file: PathBuf,
        /// Node ceiling
        #[arg(long, default_value_t = 10000)]
        max_nodes: usize,
        /// Prune nodes that cannot beat the incumbent
        #[arg(long)]
        prune: bool,
    },
    /// Solve a pure integer program with cutting planes
    CuttingPlane {
        /// The model file
        file: PathBuf,
        /// How cuts are derived
        #[arg(long, value_enum, default_value_t = Rule::Gomory)]
        rule: Rule,
        /// Cut ceiling
        #[arg(long, default_value_t = 500)]
        max_cuts: usize,
    },
    /// Solve a 0/1 knapsack whose first constraint is the capacity row
    Knapsack {
        /// The model file
        file: PathBuf,
        /// Node ceiling
        #[arg(long, default_value_t = 10000)]
        max_nodes: usize,
    },
    /// Report shadow prices, reduced costs and ranges of the optimal basis
    Sensitivity {
        /// The model file
        file: PathBuf,
        /// Change a variable's objective coefficient (VARIABLE=VALUE, 1-based)
        #[arg(long = "cost", value_parser = parse_change)]
        costs: Vec<(usize, f64)>,
        /// Change a constraint's right-hand side (CONSTRAINT=VALUE, 1-based)
        #[arg(long = "rhs", value_parser = parse_change)]
        rhs: Vec<(usize, f64)>,
    },
    /// Build the dual model and compare both optima
    Dual {
        /// The model file
        file: PathBuf,
    },
    /// Check a model file for errors
    Check {
        /// The model file
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    /// Gomory fractional cut from the optimal tableau
    Gomory,
    /// Cut built from the floors of the relaxed values
    Floor,
}

impl From<Rule> for CutRule {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Gomory => CutRule::Gomory,
            Rule::Floor => CutRule::SolutionFloor,
        }
    }
}

/// `INDEX=VALUE` with a 1-based index.
fn parse_change(arg: &str) -> Result<(usize, f64), String> {
    let (index, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, found '{}'", arg))?;
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| format!("invalid index '{}'", index))?;
    if index == 0 {
        return Err("indices start at 1".to_string());
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}'", value))?;
    Ok((index - 1, value))
}

fn fail(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn load(file: &Path) -> Model {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => fail(format!("reading {}: {}", file.display(), e)),
    };

    let model = match tableau_lang::Parser::parse(&source) {
        Ok(m) => m,
        Err(e) => fail(format!("parse error: {}", e)),
    };

    if let Err(e) = model.validate() {
        fail(e);
    }
    model
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(value: serde_json::Value) {
    match serde_json::to_string_pretty(&value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(e),
    }
}

/// The tableau the simplex starts from for `model`.
fn initial_tableau(model: &Model) -> Tableau {
    match Tableau::build(&model.standardized().model.split_equalities()) {
        Ok(t) => t,
        Err(e) => fail(e),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let solver = Solver::new().with_max_iterations(cli.max_iterations);

    match cli.command {
        Commands::Solve { file } => {
            let model = load(&file);
            let initial = initial_tableau(&model);
            let (solution, tableau) = match solver.solve_with_tableau(&model) {
                Ok(r) => r,
                Err(e) => fail(e),
            };

            if cli.json {
                print_json(json!({
                    "initial_tableau": initial,
                    "final_tableau": tableau,
                    "solution": solution,
                }));
            } else {
                println!("Initial tableau:");
                println!("{}", display::format_tableau(&initial));
                println!("Final tableau:");
                println!("{}", display::format_tableau(&tableau));
                println!("Basis: {}", display::format_basis(&tableau));
                print!("{}", display::format_solution(&solution));
            }

            if !solution.is_optimal() {
                std::process::exit(1);
            }
        }
        Commands::BranchAndBound { file, max_nodes, prune } => {
            let model = load(&file);
            let result = match BranchAndBound::new(solver)
                .with_max_nodes(max_nodes)
                .with_bound_pruning(prune)
                .run(&model)
            {
                Ok(r) => r,
                Err(e) => fail(e),
            };

            if cli.json {
                print_json(json!({
                    "result": result,
                    "best": result.best(),
                }));
            } else {
                print!("{}", display::format_branch_and_bound(&result));
            }

            if result.best().is_none() {
                std::process::exit(1);
            }
        }
        Commands::CuttingPlane { file, rule, max_cuts } => {
            let mut model = load(&file);
            let initial = initial_tableau(&model);
            let result = match CuttingPlane::new(solver)
                .with_rule(rule.into())
                .with_max_cuts(max_cuts)
                .run(&mut model)
            {
                Ok(r) => r,
                Err(e) => fail(e),
            };
            if cli.json {
                print_json(json!({
                    "initial_tableau": initial,
                    "result": result,
                    "model": model,
                }));
            } else {
                println!("Initial tableau:");
                println!("{}", display::format_tableau(&initial));
                for (i, cut) in result.cuts.iter().enumerate() {
                    println!("Cut {}: {}", i + 1, display::constraint(cut));
                }
                println!();
                println!("Final tableau:");
                println!("{}", display::format_tableau(&result.tableau));
                println!("Status: {}", display::status(result.status));
                println!("Pivots: {}", result.iterations);
                if !result.values.is_empty() {
                    println!("Objective: {}", display::number(result.objective_value));
                    println!("Values: {}", display::values(&result.values));
                }
            }

            if result.status != SolutionStatus::Optimal {
                std::process::exit(1);
            }
        }
        Commands::Knapsack { file, max_nodes } => {
            let model = load(&file);
            let knapsack = match Knapsack::from_model(&model) {
                Ok(k) => k.with_max_nodes(max_nodes),
                Err(e) => fail(e),
            };
            let result = knapsack.solve();

            if cli.json {
                print_json(json!({
                    "result": result,
                    "best": result.best_node(),
                }));
            } else {
                print!("{}", display::format_knapsack(&result));
            }

            if result.best.is_none() {
                std::process::exit(1);
            }
        }
        Commands::Sensitivity { file, costs, rhs } => {
            let model = load(&file);
            let mut sensitivity = match Sensitivity::solve(&solver, model) {
                Ok(s) => s,
                Err(e) => fail(e),
            };
            let analysis = match sensitivity.analysis() {
                Ok(a) => a,
                Err(e) => fail(e),
            };
            let optimal = sensitivity.tableau().clone();

            for &(variable, coefficient) in &costs {
                if let Err(e) = sensitivity.model().check_variable(variable) {
                    fail(e);
                }
                let applied = if sensitivity.tableau().basic_row(variable).is_some() {
                    sensitivity.apply_basic_change(variable, coefficient).map(|_| ())
                } else {
                    sensitivity.apply_nonbasic_change(variable, coefficient).map(|_| ())
                };
                if let Err(e) = applied {
                    fail(e);
                }
            }
            for &(constraint, value) in &rhs {
                if let Err(e) = sensitivity.apply_rhs_change(constraint, value) {
                    fail(e);
                }
            }
            let changed = !costs.is_empty() || !rhs.is_empty();
            let edited = sensitivity.tableau().clone();
            let resolved = changed.then(|| sensitivity.resolve(&solver));

            if cli.json {
                print_json(json!({
                    "model": sensitivity.model(),
                    "optimal_tableau": optimal,
                    "analysis": analysis,
                    "edited_tableau": changed.then_some(&edited),
                    "final_tableau": changed.then(|| sensitivity.tableau()),
                    "resolved": resolved,
                }));
            } else {
                println!("Optimal tableau:");
                println!("{}", display::format_tableau(&optimal));
                print!("{}", display::format_analysis(&analysis));
                if let Some(solution) = &resolved {
                    println!();
                    println!("Tableau after changes:");
                    println!("{}", display::format_tableau(&edited));
                    println!("Re-solved tableau:");
                    println!("{}", display::format_tableau(sensitivity.tableau()));
                    print!("{}", display::format_solution(solution));
                }
            }

            if resolved.is_some_and(|s| !s.is_optimal()) {
                std::process::exit(1);
            }
        }
        Commands::Dual { file } => {
            let model = load(&file);
            let report = match tableau_solver::verify_duality(&solver, &model) {
                Ok(r) => r,
                Err(e) => fail(e),
            };

            if cli.json {
                print_json(json!(report));
            } else {
                println!("Dual model:");
                print!("{}", tableau_lang::write_model(&report.dual_model));
                println!();
                println!("Primal:");
                print!("{}", display::format_solution(&report.primal));
                println!();
                println!("Dual:");
                print!("{}", display::format_solution(&report.dual));
                println!();
                println!("Duality: {:?}", report.verdict);
            }

            if matches!(report.verdict, DualityVerdict::Unresolved | DualityVerdict::Violated) {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let model = load(&file);
            if cli.json {
                print_json(json!(model));
            } else {
                let integers = model.sign_restrictions.iter().filter(|r| r.is_integer()).count();
                println!(
                    "OK: {:?} over {} variables, {} constraints, {} integer",
                    model.objective.sense,
                    model.num_variables(),
                    model.num_constraints(),
                    integers
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_change() {
        assert_eq!(parse_change("2=4.5"), Ok((1, 4.5)));
        assert_eq!(parse_change(" 1 = -3 "), Ok((0, -3.0)));
        assert!(parse_change("0=1").is_err());
        assert!(parse_change("x1=1").is_err());
        assert!(parse_change("3").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["tableau", "-vv", "--json", "cutting-plane", "model.txt", "--rule", "floor"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::CuttingPlane {
                rule: Rule::Floor,
                max_cuts: 500,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["tableau", "sensitivity", "m.txt", "--cost", "1=4", "--rhs", "3=24"]).unwrap();
        match cli.command {
            Commands::Sensitivity { costs, rhs, .. } => {
                assert_eq!(costs, vec![(0, 4.0)]);
                assert_eq!(rhs, vec![(2, 24.0)]);
            }
            _ => panic!("expected the sensitivity command"),
        }
    }
}
