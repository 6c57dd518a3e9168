use std::path::{Path, PathBuf};

use assert_approx_eq::assert_approx_eq;
use pandemic_sim::dataset::{load_dataset, load_node_metadata, NodeSelection, StratificationFilter};
use pandemic_sim::prelude::*;
use pandemic_sim::seatird::StochasticSeatird;
use pandemic_sim::transition::Compartment;
use strum::IntoEnumIterator;

const TRAVIS: NodeId = 48453;
const HAYS: NodeId = 48209;

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn context(dataset: &str, seed: u64) -> Context {
    let mut context = Context::new();
    context.init_random(seed);
    let mut dataset = load_dataset(&data(dataset)).unwrap();
    load_node_metadata(&mut dataset, &data("node_metadata.csv")).unwrap();
    context.init_simulation(dataset).unwrap();
    context
}

fn latest(context: &Context, variable: &str, node: NodeId) -> f64 {
    let dataset = context.get_dataset().unwrap();
    dataset.get_value(
        variable,
        dataset.latest_time(),
        NodeSelection::Node(node),
        &StratificationFilter::all(),
    )
}

#[test]
fn seeded_exposures_stay_put_without_transmission() {
    let mut context = context("two_nodes.json", 1);
    context.load_parameters(&data("no_transmission.json")).unwrap();
    context.load_initial_cases(&data("initial_cases.csv")).unwrap();
    context.schedule_days(1);
    context.execute();

    assert_approx_eq!(latest(&context, "susceptible", TRAVIS), 900.0);
    assert_approx_eq!(
        latest(&context, "exposed", TRAVIS) + latest(&context, "asymptomatic", TRAVIS),
        100.0
    );
    assert_approx_eq!(latest(&context, "susceptible", HAYS), 500.0);
}

#[test]
fn compartments_conserve_every_cell() {
    let mut context = context("linked_nodes.json", 5);
    context
        .set_parameters(ParametersValues {
            r0: 3.0,
            case_fatality_rates: vec![0.05; 5],
            ..ParametersValues::default()
        })
        .unwrap();
    context.expose(30, TRAVIS, &[0, 0, 0]).unwrap();
    context.expose(10, HAYS, &[3, 1, 1]).unwrap();
    context.schedule_days(40);
    context.execute();

    let dataset = context.get_dataset().unwrap();
    assert_eq!(dataset.num_times(), 41);
    let stratifications = dataset.stratifications();
    for time in [0, 10, 40] {
        for node in [TRAVIS, HAYS] {
            for cell in 0..dataset.num_cells() {
                let filter = StratificationFilter::from_key(&stratifications.key_of(cell));
                let total: f64 = Compartment::iter()
                    .map(|compartment| {
                        dataset.get_value(
                            compartment.variable_name(),
                            time,
                            NodeSelection::Node(node),
                            &filter,
                        )
                    })
                    .sum();
                let population = dataset.population(NodeSelection::Node(node), &filter);
                assert_approx_eq!(total, population);
            }
        }
    }
    // The epidemic reached at least some people beyond the seeds
    assert!(latest(&context, "recovered", TRAVIS) + latest(&context, "deceased", TRAVIS) > 30.0);
}

#[test]
fn fixed_seed_reproduces_the_run() {
    let run = |seed| {
        let mut context = context("linked_nodes.json", seed);
        context
            .set_parameters(ParametersValues {
                r0: 2.0,
                ..ParametersValues::default()
            })
            .unwrap();
        context.expose(20, TRAVIS, &[1, 0, 0]).unwrap();
        context.schedule_days(15);
        context.execute();
        let dataset = context.get_dataset().unwrap();
        dataset
            .variable_names()
            .into_iter()
            .map(|name| dataset.variable_data(name).unwrap().to_vec())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(99), run(99));
}

#[test]
fn travel_exposures_are_reproducible() {
    // Preloaded infections have no contact events, so only travel exposes
    let parameters = ParametersValues {
        mean_latency_period: 1.0e6,
        ..ParametersValues::default()
    };
    let travel_exposures = |seed| {
        let mut dataset = load_dataset(&data("linked_nodes.json")).unwrap();
        let mut asymptomatic = vec![40.0; 20];
        asymptomatic[0] = 240.0;
        asymptomatic.extend(vec![0.0; 20]);
        dataset.insert_variable("asymptomatic", asymptomatic).unwrap();
        let mut model = StochasticSeatird::new(dataset, seed).unwrap();
        let outcome = model.simulate(&parameters).unwrap();
        let dataset = model.dataset();
        let exposed = dataset.get_value(
            "exposed",
            dataset.latest_time(),
            NodeSelection::Node(HAYS),
            &StratificationFilter::all(),
        );
        (outcome.travel_exposures, exposed)
    };
    let (first, exposed) = travel_exposures(7);
    assert!(first > 0);
    assert_approx_eq!(exposed, first as f64);
    assert_eq!(travel_exposures(7), (first, exposed));
}

#[test]
fn delayed_distribution_between_stockpiles() {
    let mut context = context("two_nodes.json", 2);
    context.load_parameters(&data("no_transmission.json")).unwrap();
    let stockpiles = context.get_stockpiles().unwrap();
    let state = stockpiles.find_stockpile("Central Texas").unwrap();
    let travis = stockpiles.node_stockpile(TRAVIS).unwrap();
    context.set_stockpile_quantity(state, 1000).unwrap();
    context.distribute(Some(state), Some(travis), vec![], 200, 3).unwrap();
    context.schedule_days(4);
    context.execute();

    let stockpiles = context.get_stockpiles().unwrap();
    for day in 0..3 {
        assert_eq!(stockpiles.quantity(state, day).unwrap(), 1000);
        assert_eq!(stockpiles.quantity(travis, day).unwrap(), 0);
    }
    assert_eq!(stockpiles.quantity(state, 3).unwrap(), 800);
    assert_eq!(stockpiles.quantity(travis, 3).unwrap(), 200);
    assert_eq!(stockpiles.quantity(travis, 4).unwrap(), 200);
}
