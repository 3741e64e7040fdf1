use std::collections::HashMap;

use anyhow::{bail, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::models::{DependencyRecord, Ecosystem, ManifestKind};

/// Analyzer for Java/Kotlin projects managed by Maven or Gradle.
///
/// Dependencies are named `groupId:artifactId` to keep Maven coordinates.
pub struct JavaAnalyzer;

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for JavaAnalyzer {
    fn analyze(&self, kind: ManifestKind, content: &str) -> Result<Vec<DependencyRecord>> {
        match kind {
            ManifestKind::PomXml => parse_pom_xml(content),
            _ => parse_build_gradle(content),
        }
    }
}

fn make_dep(group_id: &str, artifact_id: &str, version: &str) -> DependencyRecord {
    let name = if group_id.is_empty() {
        artifact_id.to_string()
    } else {
        format!("{}:{}", group_id, artifact_id)
    };
    DependencyRecord::declared(name, Ecosystem::Java, version)
}

struct PomDependency {
    group_id: String,
    artifact_id: String,
    version: String,
}

/// Parse `pom.xml` using the quick-xml event API.
///
/// `${property}` versions are substituted from `<properties>` and
/// `${project.version}`; unknown properties are kept verbatim. Dependencies
/// without a version are managed by a parent POM and are skipped.
fn parse_pom_xml(content: &str) -> Result<Vec<DependencyRecord>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut properties: HashMap<String, String> = HashMap::new();
    let mut declared: Vec<PomDependency> = Vec::new();
    let mut current: Option<PomDependency> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                if name == "dependency" && stack.last().is_some_and(|p| p == "dependencies") {
                    current = Some(PomDependency {
                        group_id: String::new(),
                        artifact_id: String::new(),
                        version: String::new(),
                    });
                }
                stack.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                if name == "dependency" {
                    if let Some(dep) = current.take() {
                        if !dep.artifact_id.is_empty() {
                            declared.push(dep);
                        }
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape()?.trim().to_string();
                let depth = stack.len();
                let tag = stack.last().map(String::as_str).unwrap_or_default();
                let parent = depth
                    .checked_sub(2)
                    .and_then(|i| stack.get(i))
                    .map(String::as_str);

                if let Some(dep) = current.as_mut().filter(|_| parent == Some("dependency")) {
                    match tag {
                        "groupId" => dep.group_id = text,
                        "artifactId" => dep.artifact_id = text,
                        "version" => dep.version = text,
                        _ => {}
                    }
                } else if depth == 3 && parent == Some("properties") {
                    properties.insert(tag.to_string(), text);
                } else if depth == 2 && tag == "version" && parent == Some("project") {
                    properties.insert("project.version".to_string(), text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => bail!(
                "malformed XML at byte {}: {}",
                reader.buffer_position(),
                err
            ),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        bail!("unexpected end of document inside <{}>", stack.join("/"));
    }

    let deps = declared
        .into_iter()
        .filter(|d| {
            if d.version.is_empty() {
                tracing::debug!(artifact = %d.artifact_id, "skipping dependency with managed version");
                false
            } else {
                true
            }
        })
        .map(|d| {
            let version = substitute_property(&d.version, &properties);
            make_dep(&d.group_id, &d.artifact_id, &version)
        })
        .collect();

    Ok(deps)
}

fn substitute_property(version: &str, properties: &HashMap<String, String>) -> String {
    version
        .strip_prefix("${")
        .and_then(|v| v.strip_suffix('}'))
        .and_then(|key| properties.get(key))
        .cloned()
        .unwrap_or_else(|| version.to_string())
}

/// Parse `build.gradle` or `build.gradle.kts` with regex.
fn parse_build_gradle(content: &str) -> Result<Vec<DependencyRecord>> {
    let mut deps = Vec::new();
    let configurations =
        r"(?:implementation|api|compileOnly|runtimeOnly|testImplementation|testRuntimeOnly|annotationProcessor|kapt|classpath)";

    // implementation 'group:artifact:version'
    // implementation("group:artifact:version")
    let re_shorthand = Regex::new(&format!(
        r#"{}\s*\(?\s*['"]([^'":\s]+):([^'":\s]+):([^'"\s]+)['"]"#,
        configurations
    ))?;

    for caps in re_shorthand.captures_iter(content) {
        let version = caps[3].split('@').next().unwrap_or(&caps[3]);
        deps.push(make_dep(&caps[1], &caps[2], version));
    }

    // implementation group: 'com.example', name: 'foo', version: '1.0'
    let re_map = Regex::new(&format!(
        r#"{}\s*\(?\s*group\s*[:=]\s*['"]([^'"]+)['"]\s*,\s*name\s*[:=]\s*['"]([^'"]+)['"]\s*,\s*version\s*[:=]\s*['"]([^'"]+)['"]"#,
        configurations
    ))?;

    for caps in re_map.captures_iter(content) {
        deps.push(make_dep(&caps[1], &caps[2], &caps[3]));
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pom_xml() {
        let xml = r#"<?xml version="1.0"?>
<project>
  <version>2.1.0</version>
  <properties>
    <guava.version>31.1-jre</guava.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.apache.commons</groupId>
      <artifactId>commons-lang3</artifactId>
      <version>3.12.0</version>
    </dependency>
    <dependency>
      <groupId>com.google.guava</groupId>
      <artifactId>guava</artifactId>
      <version>${guava.version}</version>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>sibling</artifactId>
      <version>${project.version}</version>
    </dependency>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
    </dependency>
  </dependencies>
</project>"#;

        let deps = parse_pom_xml(xml).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "org.apache.commons:commons-lang3");
        assert_eq!(deps[0].requested_constraint, "3.12.0");
        assert_eq!(deps[1].requested_constraint, "31.1-jre");
        assert_eq!(deps[2].requested_constraint, "2.1.0");
    }

    #[test]
    fn test_unknown_property_kept_verbatim() {
        let xml = r#"<project><dependencies><dependency>
<groupId>g</groupId><artifactId>a</artifactId><version>${missing}</version>
</dependency></dependencies></project>"#;
        let deps = parse_pom_xml(xml).unwrap();
        assert_eq!(deps[0].requested_constraint, "${missing}");
    }

    #[test]
    fn test_malformed_pom() {
        assert!(parse_pom_xml("<project><dependencies></project>").is_err());
        assert!(parse_pom_xml("<project><dependencies>").is_err());
    }

    #[test]
    fn test_parse_build_gradle() {
        let content = r#"
dependencies {
    implementation 'org.springframework:spring-core:5.3.23'
    implementation "com.google.guava:guava:31.1-jre"
    testImplementation 'junit:junit:4.13.2'
    implementation group: 'com.squareup.okhttp3', name: 'okhttp', version: '4.10.0'
}
"#;
        let deps = parse_build_gradle(content).unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(deps[3].name, "com.squareup.okhttp3:okhttp");
    }

    #[test]
    fn test_parse_build_gradle_kts() {
        let content = r#"
dependencies {
    implementation("io.ktor:ktor-server-core:2.3.4")
    testImplementation(kotlin("test"))
}
"#;
        let deps = parse_build_gradle(content).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "io.ktor:ktor-server-core");
        assert_eq!(deps[0].requested_constraint, "2.3.4");
    }
}
