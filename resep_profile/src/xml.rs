// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

//! Persistence of input profiles as indented XML:
//!
//! ```xml
//! <inputProfile>
//!      <maxSteps>100</maxSteps>
//!      <qosRequirement>ReliabilityQoS</qosRequirement>
//!      <variables>
//!           <variable name="pickUp">
//!                <value type="String" ratio="0.4">Leuven</value>
//!           </variable>
//!      </variables>
//! </inputProfile>
//! ```

use resep_api::error::ResepError;
use resep_api::typed_value::TypedValue;

use crate::input_profile::{InputProfile, InputProfileValue, InputProfileVariable};

const INDENT: &str = "     ";

pub fn load_profile(path: &str) -> Result<InputProfile, ResepError> {
    let text = std::fs::read_to_string(path).map_err(|err| ResepError::io(path, err))?;
    let profile = parse_profile(&text, path)?;
    log::info!(
        "loaded input profile {}: max steps {}, {} variables",
        path,
        profile.max_steps,
        profile.variables().len()
    );
    Ok(profile)
}

pub fn save_profile(path: &str, profile: &InputProfile) -> Result<(), ResepError> {
    std::fs::write(path, profile_to_xml(profile)).map_err(|err| ResepError::io(path, err))?;
    log::info!("saved input profile {}", path);
    Ok(())
}

fn children<'a, 'input>(node: roxmltree::Node<'a, 'input>, tag: &'a str) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children().filter(move |x| x.is_element() && x.tag_name().name() == tag)
}

pub fn parse_profile(text: &str, source_name: &str) -> Result<InputProfile, ResepError> {
    let doc = roxmltree::Document::parse(text).map_err(|err| ResepError::parse(source_name, err.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "inputProfile" {
        return Err(ResepError::parse(
            source_name,
            format!("unexpected root element <{}>", root.tag_name().name()),
        ));
    }

    let max_steps = match children(root, "maxSteps").next() {
        Some(node) => {
            let text = node.text().unwrap_or_default().trim();
            text.parse::<u64>()
                .map_err(|_| ResepError::parse(source_name, format!("invalid maxSteps '{}'", text)))?
        }
        None => return Err(ResepError::parse(source_name, "missing maxSteps")),
    };
    let qos_requirement = children(root, "qosRequirement")
        .next()
        .and_then(|x| x.text())
        .unwrap_or_default()
        .trim()
        .to_string();

    let mut profile = InputProfile::new(max_steps, &qos_requirement);
    for variables in children(root, "variables") {
        for variable in children(variables, "variable") {
            let name = match variable.attribute("name") {
                Some(name) if !name.is_empty() => name,
                _ => return Err(ResepError::parse(source_name, "variable without name")),
            };
            if profile.variable(name).is_some() {
                return Err(ResepError::parse(source_name, format!("duplicate variable {}", name)));
            }
            let mut values = vec![];
            for value in children(variable, "value") {
                let type_tag = value.attribute("type").unwrap_or("String");
                let ratio_text = value.attribute("ratio").unwrap_or_default();
                let ratio = ratio_text.trim().parse::<f64>().map_err(|_| {
                    ResepError::parse(source_name, format!("invalid ratio '{}' in variable {}", ratio_text, name))
                })?;
                let data = TypedValue::parse(type_tag, value.text().unwrap_or_default())
                    .map_err(|err| ResepError::parse(source_name, format!("variable {}: {}", name, err)))?;
                values.push(InputProfileValue { data, ratio });
            }
            let variable = InputProfileVariable::new(name, values).map_err(|err| ResepError::parse(source_name, err.to_string()))?;
            profile.add_variable(variable);
        }
    }
    Ok(profile)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn profile_to_xml(profile: &InputProfile) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n<inputProfile>\n");
    out.push_str(&format!("{}<maxSteps>{}</maxSteps>\n", INDENT, profile.max_steps));
    out.push_str(&format!(
        "{}<qosRequirement>{}</qosRequirement>\n",
        INDENT,
        escape(&profile.qos_requirement)
    ));
    out.push_str(&format!("{}<variables>\n", INDENT));
    for variable in profile.variables() {
        out.push_str(&format!("{}{}<variable name=\"{}\">\n", INDENT, INDENT, escape(variable.name())));
        for value in variable.values() {
            out.push_str(&format!(
                "{}{}{}<value type=\"{}\" ratio=\"{}\">{}</value>\n",
                INDENT,
                INDENT,
                INDENT,
                value.data.type_tag(),
                value.ratio,
                escape(&value.data.to_string())
            ));
        }
        out.push_str(&format!("{}{}</variable>\n", INDENT, INDENT));
    }
    out.push_str(&format!("{}</variables>\n", INDENT));
    out.push_str("</inputProfile>\n");
    out
}

#[cfg(test)]
mod test {
    use super::*;

    const PROFILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<inputProfile>
  <maxSteps>25</maxSteps>
  <qosRequirement>ReliabilityQoS &amp; CostQoS</qosRequirement>
  <variables>
    <variable name="destination">
      <value type="String" ratio="0.5">Leuven</value>
      <value type="String" ratio="1.5">Sint-Niklaas &lt;BE&gt;</value>
    </variable>
    <variable name="passengers">
      <value type="Integer" ratio="1">2</value>
      <value type="Integer" ratio="0">3</value>
    </variable>
    <variable name="budget">
      <value type="Double" ratio="2.25">99.95</value>
    </variable>
    <variable name="flexible">
      <value type="Boolean" ratio="1">true</value>
    </variable>
    <variable name="nights">
      <value type="Short" ratio="1">3</value>
      <value type="Long" ratio="1">10000000000</value>
      <value type="Float" ratio="1">0.1</value>
    </variable>
  </variables>
</inputProfile>
"#;

    #[test]
    fn test_parse_profile() {
        let profile = parse_profile(PROFILE, "test").unwrap();
        assert_eq!(25, profile.max_steps);
        assert_eq!("ReliabilityQoS & CostQoS", profile.qos_requirement);
        assert_eq!(
            vec!["destination", "passengers", "budget", "flexible", "nights"],
            profile.variable_names()
        );
        let destination = profile.variable("destination").unwrap();
        assert_eq!(TypedValue::Text("Sint-Niklaas <BE>".to_string()), destination.values()[1].data);
        assert_eq!(2.0, destination.total_ratio());
        assert_eq!(TypedValue::Double(99.95), profile.variable("budget").unwrap().values()[0].data);
        assert_eq!(TypedValue::Long(10000000000), profile.variable("nights").unwrap().values()[1].data);
    }

    #[test]
    fn test_profile_round_trip() {
        let original = parse_profile(PROFILE, "test").unwrap();
        let path = std::env::temp_dir().join(format!("resep-profile-{}.xml", uuid::Uuid::new_v4()));
        let path = path.to_str().unwrap();

        save_profile(path, &original).unwrap();
        let reloaded = load_profile(path).unwrap();
        assert_eq!(original, reloaded);

        // edit and persist
        let mut edited = reloaded;
        edited.set_max_steps(7);
        edited.variable_mut("passengers").unwrap().add_value("4", 0.75).unwrap();
        save_profile(path, &edited).unwrap();
        let reloaded = load_profile(path).unwrap();
        assert_eq!(edited, reloaded);
        assert_eq!(3, reloaded.variable("passengers").unwrap().values().len());

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\n     <maxSteps>7</maxSteps>\n"));
        assert!(text.contains("\n          <variable name=\"passengers\">\n"));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_parse_profile_malformed() {
        let is_parse_error = |text: &str| matches!(parse_profile(text, "test"), Err(ResepError::Parse { .. }));
        assert!(is_parse_error("<inputProfile><maxSteps>1</maxSteps>"));
        assert!(is_parse_error("<profile><maxSteps>1</maxSteps></profile>"));
        assert!(is_parse_error("<inputProfile></inputProfile>"));
        assert!(is_parse_error("<inputProfile><maxSteps>-1</maxSteps></inputProfile>"));
        assert!(is_parse_error(
            r#"<inputProfile><maxSteps>1</maxSteps><variables><variable name="v"><value type="Integer" ratio="1">x</value></variable></variables></inputProfile>"#
        ));
        assert!(is_parse_error(
            r#"<inputProfile><maxSteps>1</maxSteps><variables><variable name="v"><value ratio="abc">x</value></variable></variables></inputProfile>"#
        ));
        assert!(is_parse_error(
            r#"<inputProfile><maxSteps>1</maxSteps><variables><variable name="v"><value ratio="0">x</value></variable></variables></inputProfile>"#
        ));
        assert!(is_parse_error(
            r#"<inputProfile><maxSteps>1</maxSteps><variables><variable><value ratio="1">x</value></variable></variables></inputProfile>"#
        ));
        assert!(is_parse_error(
            r#"<inputProfile><maxSteps>1</maxSteps><variables><variable name="v"><value ratio="1">x</value></variable><variable name="v"><value ratio="1">y</value></variable></variables></inputProfile>"#
        ));

        // no variables, no qos: valid
        let profile = parse_profile("<inputProfile><maxSteps>3</maxSteps></inputProfile>", "test").unwrap();
        assert_eq!(3, profile.max_steps);
        assert!(profile.qos_requirement.is_empty());

        assert!(matches!(load_profile("/nonexistent/profile.xml"), Err(ResepError::Io { .. })));
    }
}
