use clap::Parser;
use log::info;
use rand::random;
use took::Timer;

use vrptw_pricing::pricing::{
    EspptwccLabelCorrecting, EspptwccPulse, PricingProblem, SpptwccLabelSetting,
};
use vrptw_pricing::problem::generator::{generate_instance, random_duals, GeneratorParams};
use vrptw_pricing::utils::create_seeded_rng;

mod cli;

use cli::SolverVariant;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )?;
    let args = cli::ProgramArguments::parse_from(args);
    info!("{:?}", &args);

    let (seed_value, mut rng) = {
        let seed_value = args.seed.unwrap_or_else(|| random::<i128>().abs());
        info!("seed: {}", seed_value);
        (seed_value, create_seeded_rng(seed_value))
    };

    let instance = generate_instance(
        &mut rng,
        &GeneratorParams {
            num_customers: args.customers,
            capacity: args.capacity,
            horizon: args.horizon,
            ..GeneratorParams::default()
        },
    );
    let duals = random_duals(&mut rng, &instance, args.duals_scale);
    info!(
        "instance {} with {} customers, seed {}",
        instance.name,
        instance.num_customers(),
        seed_value
    );

    let pulse_params = args.pulse_params()?;
    let mut solvers: Vec<(&str, Box<dyn PricingProblem + '_>)> = vec![];
    match args.solver {
        SolverVariant::LabelSetting => {
            solvers.push(("label-setting", Box::new(SpptwccLabelSetting::new(&instance))));
        }
        SolverVariant::LabelCorrecting => {
            solvers.push((
                "label-correcting",
                Box::new(EspptwccLabelCorrecting::new(&instance)),
            ));
        }
        SolverVariant::Pulse => {
            solvers.push((
                "pulse",
                Box::new(EspptwccPulse::with_params(&instance, pulse_params)),
            ));
        }
        SolverVariant::All => {
            solvers.push(("label-setting", Box::new(SpptwccLabelSetting::new(&instance))));
            solvers.push((
                "label-correcting",
                Box::new(EspptwccLabelCorrecting::new(&instance)),
            ));
            solvers.push((
                "pulse",
                Box::new(EspptwccPulse::with_params(&instance, pulse_params)),
            ));
        }
    }

    for (name, solver) in &mut solvers {
        let timer = Timer::new();
        solver.solve(&duals, instance.travel_times())?;
        match solver.revised_cost_of_shortest_path() {
            Some(cost) => {
                println!("{}: reduced cost {:.4}, took {}", name, cost, timer.took());
                for path in solver.shortest_paths() {
                    println!("  {} (cost {:.2})", path, path.cost());
                }
            }
            None => println!("{}: no feasible path", name),
        }
    }

    Ok(())
}
