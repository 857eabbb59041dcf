// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;

/// Call of an operation on a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub service: String,
    pub operation: String,
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.service, self.operation)
    }
}

/// Sequence of calls executed once per invocation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    steps: Vec<WorkflowStep>,
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Extract `service.operation` from a token such as `x=Service.op(a);`.
fn parse_token(token: &str) -> Option<WorkflowStep> {
    let (before, after) = token.split_once('.')?;
    let service_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let service = &before[service_start..];
    let operation_end = after.find(|c: char| !is_identifier_char(c)).unwrap_or(after.len());
    let operation = &after[..operation_end];
    match service.chars().next() {
        Some(c) if (c.is_alphabetic() || c == '_') && !operation.is_empty() && service != "this" => Some(WorkflowStep {
            service: service.to_string(),
            operation: operation.to_string(),
        }),
        _ => None,
    }
}

impl Workflow {
    /// Parse a workflow definition: every whitespace-separated token of the
    /// form `service.operation` is a call, in order. Lines without a `.`,
    /// comment lines starting with `//` or `#`, and `this.*` self-references
    /// are ignored.
    pub fn parse(text: &str, source_name: &str) -> Result<Self, ResepError> {
        let mut steps = vec![];
        for line in text.lines() {
            let trimmed = line.trim_start();
            if !line.contains('.') || trimmed.starts_with("//") || trimmed.starts_with('#') {
                continue;
            }
            steps.extend(line.split_whitespace().filter_map(parse_token));
        }
        if steps.is_empty() {
            return Err(ResepError::parse(source_name, "no service call found"));
        }
        Ok(Self { steps })
    }

    pub fn load(path: &str) -> Result<Self, ResepError> {
        let text = std::fs::read_to_string(path).map_err(|err| ResepError::io(path, err))?;
        let workflow = Self::parse(&text, path)?;
        log::info!("loaded workflow {}: {}", path, workflow);
        Ok(workflow)
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// Services called, in order of first call.
    pub fn participants(&self) -> Vec<String> {
        let mut participants: Vec<String> = vec![];
        for step in &self.steps {
            if !participants.contains(&step.service) {
                participants.push(step.service.clone());
            }
        }
        participants
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.steps.iter().map(|x| x.to_string()).collect::<Vec<String>>().join(" -> "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn step(service: &str, operation: &str) -> WorkflowStep {
        WorkflowStep {
            service: service.to_string(),
            operation: operation.to_string(),
        }
    }

    #[test]
    fn test_workflow_parse() {
        let workflow = Workflow::parse(
            r#"
// Plan a trip: FlightService.ignored
this.start()
  FlightService.searchFlight   FlightService.bookFlight
no calls on this line
booking = HotelService.bookHotel(destination, nights);
# CarService.ignored
this.notify(PaymentService.pay) CarService.rentCar
"#,
            "test",
        )
        .unwrap();
        assert_eq!(
            vec![
                step("FlightService", "searchFlight"),
                step("FlightService", "bookFlight"),
                step("HotelService", "bookHotel"),
                step("CarService", "rentCar"),
            ],
            workflow.steps()
        );
        assert_eq!(vec!["FlightService", "HotelService", "CarService"], workflow.participants());
        assert_eq!(
            "FlightService.searchFlight -> FlightService.bookFlight -> HotelService.bookHotel -> CarService.rentCar",
            workflow.to_string()
        );
    }

    #[test]
    fn test_workflow_parse_tokens() {
        assert_eq!(Some(step("ServiceX", "opY")), parse_token("ServiceX.opY"));
        assert_eq!(Some(step("ServiceX", "opY")), parse_token("(ServiceX.opY);"));
        assert_eq!(Some(step("Service_2", "op_y")), parse_token("x=Service_2.op_y()"));
        assert_eq!(None, parse_token("this.opY"));
        assert_eq!(None, parse_token("1.5"));
        assert_eq!(None, parse_token("ServiceX."));
        assert_eq!(None, parse_token(".opY"));
        assert_eq!(None, parse_token("ServiceX"));
    }

    #[test]
    fn test_workflow_parse_empty() {
        assert!(matches!(Workflow::parse("", "test"), Err(ResepError::Parse { .. })));
        assert!(Workflow::parse("this.run()\nnothing here\n", "test").is_err());
        assert!(matches!(Workflow::load("/nonexistent/wf.txt"), Err(ResepError::Io { .. })));
    }
}
