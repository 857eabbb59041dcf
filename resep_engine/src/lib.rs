// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod commands;
pub mod engine;
pub mod progress;
pub mod workflow;

use resep_messaging::context::{SimulationContext, SimulationSettings};
use resep_registry::{ConfigurationSettings, ServiceSettings};

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ResepGeneralSettings {
    /// Path of the workflow definition.
    pub workflow: String,
    /// Path of the input profile.
    pub input_profile: String,
    /// Directory where input profiles are looked up.
    pub profiles_dir: String,
    pub results_file: String,
    pub log_file: String,
    /// Append to the results and log files instead of overwriting them.
    #[serde(default)]
    pub append: bool,
    /// Seed of all the pseudo-random number generators.
    pub seed: u64,
    pub progress_period_ms: u64,
    pub liveness_period_ms: u64,
    /// Services that answered within this window are considered alive.
    pub liveness_window_ms: u64,
    /// Read commands from the standard input while running.
    #[serde(default)]
    pub interactive: bool,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ResepSettings {
    pub general: ResepGeneralSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub services: Vec<ServiceSettings>,
    pub configurations: Vec<ConfigurationSettings>,
}

/// Run the workflow of the settings to completion, or until Ctrl-C.
/// In interactive mode the configuration and the simulation knobs can be
/// changed during the run, see [`commands::Command`].
///
/// If `configuration` is not empty it is selected in place of the first
/// configuration of the settings.
pub async fn resep_main(settings: ResepSettings, configuration: &str) -> anyhow::Result<engine::RunSummary> {
    log::info!("Starting RESEP");
    log::debug!("Settings: {:?}", settings);

    let context = SimulationContext::new(settings.simulation, settings.general.seed)?;
    let registry = resep_registry::registry::ServiceRegistry::new();
    registry
        .register(resep_api::service::ServiceDescriptor::new(
            resep_api::ROOT_SERVICE,
            resep_api::ROOT_SERVICE,
            "local",
            vec![],
        ))
        .await?;
    resep_registry::populate(&registry, &settings.services).await?;
    log::info!("registered services: {}", registry.registered_services().await.join(", "));

    let composite = resep_registry::composite::CompositeService::new(
        registry.clone(),
        resep_messaging::simulator::MessagingSimulator::new(context.clone()),
    );
    let mut configurations: Vec<Box<dyn resep_registry::configuration::Configuration>> = vec![];
    for conf in &settings.configurations {
        configurations.push(Box::new(resep_registry::configuration::StrategyConfiguration::new(conf.clone())));
    }
    let switch = resep_registry::configuration::ConfigurationSwitch::new(composite.clone(), configurations).await?;
    if !configuration.is_empty() {
        switch.select(configuration).await?;
    }

    let sink = resep_telemetry::MetricsSink::new(&settings.general.results_file, &settings.general.log_file, settings.general.append)?;
    let switch = std::sync::Arc::new(switch);
    let mut engine = engine::WorkflowEngine::new(context.clone(), composite, switch.clone(), sink);
    engine.start(&settings.general.workflow, &settings.general.input_profile)?;

    let command_task = if settings.general.interactive {
        log::info!("reading commands from the standard input");
        let target = commands::CommandTarget {
            switch,
            context,
            handle: engine.handle(),
        };
        Some(tokio::spawn(commands::CommandListener::new(tokio::io::BufReader::new(tokio::io::stdin()), target)))
    } else {
        None
    };

    let (mut liveness_receiver, liveness_task) = resep_registry::liveness::LivenessMonitor::new(
        registry,
        std::time::Duration::from_millis(settings.general.liveness_period_ms),
        std::time::Duration::from_millis(settings.general.liveness_window_ms),
    );
    let liveness_task = tokio::spawn(liveness_task);
    let liveness_logger = tokio::spawn(async move {
        while let Some(snapshot) = liveness_receiver.recv().await {
            log::info!("alive: [{}], stale: [{}]", snapshot.alive.join(", "), snapshot.stale.join(", "));
        }
    });

    let (mut progress_receiver, progress_task) =
        progress::ProgressReporter::new(engine.handle(), std::time::Duration::from_millis(settings.general.progress_period_ms));
    let progress_task = tokio::spawn(progress_task);
    let progress_logger = tokio::spawn(async move {
        while let Some(progress) = progress_receiver.recv().await {
            log::info!("progress: {}", progress);
        }
    });

    let handle = engine.handle();
    let interrupt_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted");
            handle.stop();
        }
    });

    let summary = engine.wait().await;

    interrupt_task.abort();
    if let Some(command_task) = command_task {
        command_task.abort();
    }
    liveness_task.abort();
    let _ = progress_task.await;
    let _ = futures::future::join(liveness_logger, progress_logger).await;
    summary
}

/// Write the default settings to `path`, and the default workflow and input
/// profile they refer to in the same directory. Existing files are not
/// overwritten.
pub fn create_templates(path: &str) -> anyhow::Result<()> {
    let settings: ResepSettings = toml::from_str(&resep_default_conf())?;
    let base = std::path::Path::new(path).parent().unwrap_or(std::path::Path::new(""));
    resep_api::util::create_template(path, &resep_default_conf())?;
    for (relative, content) in [
        (&settings.general.workflow, resep_default_workflow()),
        (&settings.general.input_profile, resep_default_input_profile()),
    ] {
        let target = base.join(relative);
        match target.to_str() {
            Some(target) => resep_api::util::create_template(target, &content)?,
            None => anyhow::bail!("invalid template path: {}", target.display()),
        }
    }
    Ok(())
}

pub fn resep_default_conf() -> String {
    String::from(
        r##"[general]
workflow = "resources/TravelPlannerWorkflow.txt"
input_profile = "resources/files/TravelPlannerProfile.xml"
profiles_dir = "resources/files"
results_file = "results/result.csv"
log_file = "results/log.csv"
append = false
seed = 42
progress_period_ms = 1000
liveness_period_ms = 1000
liveness_window_ms = 5000
interactive = false

[simulation]
min_delay_ms = 5
max_delay_ms = 20
loss_percent = 2
time_scale = 1

[[services]]
service_name = "FlightService"
service_type = "FlightService"
endpoint = "service.flight"
operations = [
    { name = "searchFlight", parameters = ["destination", "departureDate"] },
    { name = "bookFlight", parameters = ["destination"] },
]
profiles = [
    { kind = "Reliability", failure_rate = 0.15 },
    { kind = "Cost", cost = 6.0 },
    { kind = "Performance", min_latency_ms = 10, max_latency_ms = 40 },
]

[[services]]
service_name = "FlightService2"
service_type = "FlightService"
endpoint = "service.flight2"
operations = [
    { name = "searchFlight", parameters = ["destination", "departureDate"] },
    { name = "bookFlight", parameters = ["destination"] },
]
profiles = [
    { kind = "Reliability", failure_rate = 0.05 },
    { kind = "Cost", cost = 9.5 },
    { kind = "Performance", min_latency_ms = 20, max_latency_ms = 60 },
]

[[services]]
service_name = "HotelService"
service_type = "HotelService"
endpoint = "service.hotel"
operations = [ { name = "bookHotel", parameters = ["destination", "nights"] } ]
custom_properties = { stars = { type = "Integer", value = 4 } }
profiles = [
    { kind = "Reliability", failure_rate = 0.1 },
    { kind = "Cost", cost = 4.0 },
    { kind = "Performance", min_latency_ms = 10, max_latency_ms = 30 },
]

[[services]]
service_name = "CarRentalService"
service_type = "CarService"
endpoint = "service.car"
operations = [ { name = "rentCar", parameters = ["destination", "nights"] } ]
profiles = [
    { kind = "Reliability", failure_rate = 0.2 },
    { kind = "Cost", cost = 3.0 },
]

[[services]]
service_name = "CarService"
service_type = "CarService"
endpoint = "service.car2"
operations = [ { name = "rentCar", parameters = ["destination", "nights"] } ]
profiles = [
    { kind = "Reliability", failure_rate = 0.05 },
    { kind = "Cost", cost = 5.0 },
    { kind = "Performance", min_latency_ms = 5, max_latency_ms = 15 },
]
inactive_profiles = ["Performance"]

[[services]]
service_name = "PaymentService"
service_type = "PaymentService"
endpoint = "service.payment"
operations = [ { name = "pay", parameters = ["amount"] } ]
profiles = [
    { kind = "Reliability", failure_rate = 0.01 },
    { kind = "Cost", cost = 1.0 },
]

[[configurations]]
name = "No adaptation"
strategy = "NoAdaptation"

[[configurations]]
name = "Retry"
strategy = { Retry = { max_attempts = 3 } }

[[configurations]]
name = "Failover"
strategy = "Failover"
"##,
    )
}

pub fn resep_default_workflow() -> String {
    String::from(
        r##"// Travel planner: one booking per invocation round
this.start(destination, departureDate, nights, amount)
flights = FlightService.searchFlight(destination, departureDate);
booking = FlightService.bookFlight(destination);
hotel = HotelService.bookHotel(destination, nights);
car = CarRentalService.rentCar(destination, nights);
receipt = PaymentService.pay(amount);
"##,
    )
}

pub fn resep_default_input_profile() -> String {
    String::from(
        r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<inputProfile>
     <maxSteps>100</maxSteps>
     <qosRequirement>CostQoS</qosRequirement>
     <variables>
          <variable name="destination">
               <value type="String" ratio="0.5">Lisbon</value>
               <value type="String" ratio="0.3">Leuven</value>
               <value type="String" ratio="0.2">Pisa</value>
          </variable>
          <variable name="departureDate">
               <value type="String" ratio="1.0">2024-07-01</value>
          </variable>
          <variable name="nights">
               <value type="Integer" ratio="0.6">2</value>
               <value type="Integer" ratio="0.4">7</value>
          </variable>
          <variable name="amount">
               <value type="Double" ratio="0.7">350.0</value>
               <value type="Double" ratio="0.3">1200.0</value>
          </variable>
     </variables>
</inputProfile>
"##,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    struct TempDir {
        path: std::path::PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            Self {
                path: std::env::temp_dir().join(format!("resep-main-{}", uuid::Uuid::new_v4())),
            }
        }

        fn file(&self, name: &str) -> String {
            self.path.join(name).to_str().unwrap().to_string()
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn test_default_settings() {
        let settings: ResepSettings = toml::from_str(&resep_default_conf()).unwrap();
        assert_eq!(6, settings.services.len());
        assert_eq!(
            vec!["No adaptation", "Retry", "Failover"],
            settings.configurations.iter().map(|x| x.name.as_str()).collect::<Vec<&str>>()
        );
        settings.simulation.validate().unwrap();
        assert!(!settings.general.interactive);
        for service in &settings.services {
            service.to_service().unwrap();
        }

        let workflow = workflow::Workflow::parse(&resep_default_workflow(), "default").unwrap();
        assert_eq!(5, workflow.steps().len());
        for step in workflow.steps() {
            let service = settings.services.iter().find(|x| x.service_name == step.service).unwrap();
            assert!(service.operations.iter().any(|x| x.name == step.operation), "{}", step);
        }

        let profile = resep_profile::xml::parse_profile(&resep_default_input_profile(), "default").unwrap();
        assert_eq!(100, profile.max_steps);
        assert_eq!(vec!["destination", "departureDate", "nights", "amount"], profile.variable_names());
    }

    #[test]
    fn test_create_templates() {
        let dir = TempDir::new();
        let conf = dir.file("resep.toml");
        create_templates(&conf).unwrap();
        assert!(dir.path.join("resources/TravelPlannerWorkflow.txt").exists());
        assert!(dir.path.join("resources/files/TravelPlannerProfile.xml").exists());
        assert_eq!(
            vec![dir.path.join("resources/files/TravelPlannerProfile.xml")],
            resep_profile::list_profiles(&dir.file("resources/files")).unwrap()
        );

        // nothing is overwritten
        assert!(create_templates(&conf).is_err());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_resep_main() {
        let dir = TempDir::new();
        create_templates(&dir.file("resep.toml")).unwrap();
        let mut settings: ResepSettings = toml::from_str(&std::fs::read_to_string(dir.file("resep.toml")).unwrap()).unwrap();
        let mut profile = resep_profile::load_profile(&dir.file(&settings.general.input_profile)).unwrap();
        profile.set_max_steps(3);
        resep_profile::save_profile(&dir.file(&settings.general.input_profile), &profile).unwrap();
        settings.general.workflow = dir.file(&settings.general.workflow);
        settings.general.input_profile = dir.file(&settings.general.input_profile);
        settings.general.results_file = dir.file("results/result.csv");
        settings.general.log_file = dir.file("results/log.csv");
        settings.general.progress_period_ms = 10;
        settings.general.liveness_period_ms = 10;
        settings.simulation = SimulationSettings::default();

        let summary = resep_main(settings.clone(), "Retry").await.unwrap();
        assert_eq!(engine::EngineState::Completed, summary.state);
        assert_eq!(3, summary.rounds);

        let results = resep_telemetry::read_all(&settings.general.results_file).unwrap();
        let report = resep_telemetry::report::RunReport::from_rows(&results.rows);
        assert_eq!(3, report.rounds);
        assert_eq!(Some(2), report.last_step);
        assert!(!report.services.contains_key(resep_api::ROOT_SERVICE));

        // unknown configuration
        assert!(resep_main(settings, "Unknown").await.is_err());
    }
}
