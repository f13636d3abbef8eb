use rand::Rng;

use crate::pricing::DualPrices;
use crate::problem::vrptw::{TimeWindow, VrptwInstance};
use crate::utils::Random;

/// Knobs for the synthetic-instance generator used by the demo binary and
/// the cross-validation tests.
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    pub num_customers: usize,
    pub capacity: f64,
    pub horizon: f64,
    pub max_demand: f64,
    pub service_time: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            num_customers: 25,
            capacity: 200.0,
            horizon: 1000.0,
            max_demand: 25.0,
            service_time: 10.0,
        }
    }
}

/// Customers uniform in a 100x100 square around a central depot, with time
/// windows wide enough that most customers stay reachable.
pub fn generate_instance(rng: &mut Random, params: &GeneratorParams) -> VrptwInstance {
    let mut builder = VrptwInstance::builder(format!("synthetic-{}", params.num_customers))
        .capacity(params.capacity)
        .horizon(params.horizon)
        .depot_at(50.0, 50.0);

    for _ in 0..params.num_customers {
        let x = rng.gen_range(0.0..100.0);
        let y = rng.gen_range(0.0..100.0);
        let demand = rng.gen_range(1.0..=params.max_demand).round();
        // distance from the depot lower-bounds any arrival time
        let reach = ((x - 50.0_f64).powi(2) + (y - 50.0_f64).powi(2)).sqrt();
        let latest_center = (params.horizon * 0.8).max(reach + 1.0);
        let center = rng.gen_range(reach..latest_center);
        let width = rng.gen_range(30.0..(params.horizon * 0.25).max(31.0));
        let window = TimeWindow::new(
            (center - width).max(0.0),
            (center + width).min(params.horizon - params.service_time),
        );
        builder = builder.add_customer(x, y, demand, params.service_time, window);
    }

    builder
        .build()
        .expect("generator parameters always yield a valid instance")
}

/// Uniform dual prices in `[0, scale]` for every customer.
pub fn random_duals(rng: &mut Random, instance: &VrptwInstance, scale: f64) -> DualPrices {
    DualPrices::new(
        instance
            .customers()
            .map(|customer| (customer.id, rng.gen_range(0.0..=scale)))
            .collect::<Vec<_>>(),
    )
}
