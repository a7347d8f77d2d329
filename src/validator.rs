//! 解析后的工程校验。

use log::warn;
use std::collections::HashMap;

use crate::config::Settings;
use crate::error::ValidationError;
use crate::models::Project;
use crate::utils::config_identifier;

/// 检查工程模型的基本不变量。
///
/// "至少包含一个文件" 的检查由 `Settings::require_files` 控制，默认关闭：
/// 新格式的文件列表支持还不完整，强制检查会误伤正常工程。
pub fn validate(project: &Project, settings: &Settings) -> Result<(), ValidationError> {
    let label = if project.name.is_empty() {
        "<unnamed>"
    } else {
        project.name.as_str()
    };

    if project.dialect.is_none() {
        return Err(ValidationError::new(label, "originating dialect is not set"));
    }
    if project.name.trim().is_empty() {
        return Err(ValidationError::new(label, "project name is missing"));
    }
    if project.configurations.is_empty() {
        return Err(ValidationError::new(label, "no configurations declared"));
    }

    let mut seen: Vec<(&str, &str)> = Vec::new();
    for config in &project.configurations {
        let pair = (config.build_type.as_str(), config.platform.as_str());
        if seen.contains(&pair) {
            return Err(ValidationError::new(
                label,
                format!("configuration {} is declared more than once", config.full_name()),
            ));
        }
        seen.push(pair);
    }

    // 不同的构建类型折叠成同一个属性后缀时，生成的属性会互相覆盖
    let mut identifiers: HashMap<String, &str> = HashMap::new();
    for config in &project.configurations {
        let id = config_identifier(&config.build_type);
        match identifiers.get(&id) {
            Some(other) if *other != config.build_type => warn!(
                "{}: build types '{}' and '{}' share the identifier {}",
                label, other, config.build_type, id
            ),
            Some(_) => {}
            None => {
                identifiers.insert(id, &config.build_type);
            }
        }
    }

    if settings.require_files && project.filters.files().next().is_none() {
        return Err(ValidationError::new(label, "project lists no files"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Configuration, Dialect, FileEntry, FilterTree};

    fn project() -> Project {
        let mut project = Project::new(Dialect::Vcproj);
        project.name = "hello".to_string();
        project.configurations.push(Configuration::new("Debug", "Win32"));
        project
    }

    #[test]
    fn test_valid_project() {
        assert_eq!(validate(&project(), &Settings::default()), Ok(()));
    }

    #[test]
    fn test_missing_fields() {
        let settings = Settings::default();

        let mut p = project();
        p.dialect = None;
        assert!(validate(&p, &settings).unwrap_err().reason.contains("dialect"));

        let mut p = project();
        p.name.clear();
        let err = validate(&p, &settings).unwrap_err();
        assert_eq!(err.project, "<unnamed>");
        assert!(err.reason.contains("name"));

        let mut p = project();
        p.configurations.clear();
        assert!(validate(&p, &settings).unwrap_err().reason.contains("configurations"));
    }

    #[test]
    fn test_duplicate_configuration() {
        let mut p = project();
        p.configurations.push(Configuration::new("Debug", "Win32"));
        let err = validate(&p, &Settings::default()).unwrap_err();
        assert!(err.reason.contains("Debug|Win32"));

        let mut p = project();
        p.configurations.push(Configuration::new("Debug", "x64"));
        assert!(validate(&p, &Settings::default()).is_ok());
    }

    #[test]
    fn test_file_requirement_is_optional() {
        let p = project();
        assert!(validate(&p, &Settings::default()).is_ok());

        let settings = Settings {
            require_files: true,
            ..Settings::default()
        };
        assert!(validate(&p, &settings).is_err());

        let mut p = project();
        p.filters.add_file(FilterTree::ROOT, FileEntry::new("main.cpp"));
        assert!(validate(&p, &settings).is_ok());
    }
}
