use std::collections::HashSet;

use regex::Regex;
use url::Url;

use crate::error::ConfigError;
use crate::model::{ChainStep, PageDiscovery, ResolveMode, TargetDescriptor, TargetMode, TargetSpec};

/// Validates every spec and checks ids are unique. Order is preserved.
pub fn build_descriptors(specs: &[TargetSpec]) -> Result<Vec<TargetDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let descriptor = build_descriptor(index, spec)?;
        if !seen.insert(descriptor.id.clone()) {
            return Err(ConfigError::DuplicateId(descriptor.id));
        }
        out.push(descriptor);
    }
    Ok(out)
}

/// Validates a single spec. `index` is only used in messages.
pub fn build_descriptor(index: usize, spec: &TargetSpec) -> Result<TargetDescriptor, ConfigError> {
    let id = spec.title.trim().to_string();
    if id.is_empty() {
        return Err(ConfigError::EmptyId { index });
    }
    if Url::parse(&spec.url).is_err() {
        return Err(ConfigError::InvalidUrl {
            target: id,
            url: spec.url.clone(),
        });
    }

    let mode = match spec.mode {
        TargetMode::Static => {
            if spec.chain.is_some() {
                return Err(ConfigError::UnexpectedChain {
                    target: id,
                    field: "chain",
                });
            }
            ResolveMode::Static
        }
        TargetMode::SinglePage => {
            if spec.chain.is_some() {
                return Err(ConfigError::UnexpectedChain {
                    target: id,
                    field: "chain",
                });
            }
            ResolveMode::SinglePage(page_discovery(&id, spec)?)
        }
        TargetMode::MultiStep => {
            let page = page_discovery(&id, spec)?;
            if page.verify.captures_len() < 2 {
                return Err(ConfigError::MissingCaptureGroup { target: id });
            }
            let chain = spec.chain.as_ref().ok_or_else(|| ConfigError::MissingField {
                target: id.clone(),
                field: "chain",
                mode: TargetMode::MultiStep.as_str(),
            })?;
            if chain.template.matches("{}").count() != 1 {
                return Err(ConfigError::InvalidTemplate { target: id });
            }
            let verify = compile(&id, "chain.verify_pattern", &chain.verify_pattern)?;
            ResolveMode::MultiStep {
                page,
                chain: ChainStep {
                    template: chain.template.clone(),
                    verify,
                },
            }
        }
    };

    Ok(TargetDescriptor {
        id,
        entry_url: spec.url.clone(),
        headers: spec.headers.clone(),
        mode,
    })
}

fn page_discovery(id: &str, spec: &TargetSpec) -> Result<PageDiscovery, ConfigError> {
    let discovery = required(id, spec, "discovery_pattern", spec.discovery_pattern.as_deref())?;
    let verify = required(id, spec, "verify_pattern", spec.verify_pattern.as_deref())?;
    Ok(PageDiscovery {
        discovery: compile(id, "discovery_pattern", discovery)?,
        url_prefix: spec.url_prefix.clone().filter(|p| !p.is_empty()),
        verify: compile(id, "verify_pattern", verify)?,
    })
}

fn required<'a>(
    id: &str,
    spec: &TargetSpec,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingField {
        target: id.to_string(),
        field,
        mode: spec.mode.as_str(),
    })
}

fn compile(id: &str, field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        target: id.to_string(),
        field,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChainSpec;

    fn spec(mode: TargetMode) -> TargetSpec {
        TargetSpec {
            title: "app".into(),
            mode,
            url: "https://example.com/".into(),
            discovery_pattern: None,
            url_prefix: None,
            verify_pattern: None,
            chain: None,
            headers: Default::default(),
        }
    }

    #[test]
    fn static_needs_no_patterns() {
        let d = build_descriptor(0, &spec(TargetMode::Static)).unwrap();
        assert_eq!(d.id, "app");
        assert_eq!(d.mode.kind(), TargetMode::Static);
    }

    #[test]
    fn single_page_requires_patterns() {
        let err = build_descriptor(0, &spec(TargetMode::SinglePage)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "discovery_pattern",
                ..
            }
        ));
    }

    #[test]
    fn multi_step_requires_chain_and_capture_group() {
        let mut s = spec(TargetMode::MultiStep);
        s.discovery_pattern = Some(r#"src="([^"]+\.js)""#.into());
        s.verify_pattern = Some("apiKey".into());
        let err = build_descriptor(0, &s).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCaptureGroup { .. }));

        s.verify_pattern = Some(r#"apiKey:"(\w+)""#.into());
        let err = build_descriptor(0, &s).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "chain", .. }));

        s.chain = Some(ChainSpec {
            template: "https://cdn.example.com/{}/{}.js".into(),
            verify_pattern: "x".into(),
        });
        let err = build_descriptor(0, &s).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTemplate { .. }));

        s.chain = Some(ChainSpec {
            template: "https://cdn.example.com/{}.js".into(),
            verify_pattern: "x".into(),
        });
        let d = build_descriptor(0, &s).unwrap();
        assert_eq!(d.mode.kind(), TargetMode::MultiStep);
    }

    #[test]
    fn chain_rejected_outside_multi_step() {
        let mut s = spec(TargetMode::Static);
        s.chain = Some(ChainSpec {
            template: "{}".into(),
            verify_pattern: "x".into(),
        });
        assert!(matches!(
            build_descriptor(0, &s).unwrap_err(),
            ConfigError::UnexpectedChain { .. }
        ));
    }

    #[test]
    fn bad_regex_is_reported() {
        let mut s = spec(TargetMode::SinglePage);
        s.discovery_pattern = Some("(".into());
        s.verify_pattern = Some("x".into());
        assert!(matches!(
            build_descriptor(0, &s).unwrap_err(),
            ConfigError::InvalidPattern {
                field: "discovery_pattern",
                ..
            }
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let specs = vec![spec(TargetMode::Static), spec(TargetMode::Static)];
        assert!(matches!(
            build_descriptors(&specs).unwrap_err(),
            ConfigError::DuplicateId(id) if id == "app"
        ));
    }

    #[test]
    fn empty_title_and_bad_url_rejected() {
        let mut s = spec(TargetMode::Static);
        s.title = "  ".into();
        assert!(matches!(
            build_descriptor(3, &s).unwrap_err(),
            ConfigError::EmptyId { index: 3 }
        ));

        let mut s = spec(TargetMode::Static);
        s.url = "not a url".into();
        assert!(matches!(
            build_descriptor(0, &s).unwrap_err(),
            ConfigError::InvalidUrl { .. }
        ));
    }
}
