use crate::error::Result;
use crate::mode::Behavior;
use crate::store::SettingsStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const KEY_RULES: &str = "rules";

/// Закреплённое за приложением поведение (никогда не `Inferred`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "id")]
    pub application_id: String,
    #[serde(rename = "path")]
    pub bundle_location: PathBuf,
    pub behavior: Behavior,
}

/// Хранилище правил: единственный владелец `Rule`.
///
/// Читатели получают либо `Behavior`, либо снимок; запись и сохранение
/// выполняются под одной блокировкой, поэтому читатель не видит частичных изменений.
pub struct RuleStore {
    rules: RwLock<HashMap<String, Rule>>,
    settings: Arc<SettingsStore>,
}

impl RuleStore {
    /// Загрузить правила; некорректные записи пропускаются по одной
    pub fn load(settings: Arc<SettingsStore>) -> Self {
        let rules = read_rules(&settings);
        info!("Загружено правил: {}", rules.len());
        Self {
            rules: RwLock::new(rules),
            settings,
        }
    }

    pub fn get(&self, application_id: &str) -> Behavior {
        self.rules
            .read()
            .get(application_id)
            .map(|rule| rule.behavior)
            .unwrap_or_default()
    }

    /// Установить поведение приложения.
    ///
    /// `Inferred` удаляет правило. Возвращает `true`, если содержимое изменилось
    /// (только тогда выполняется сохранение). Перед изменением правила
    /// перечитываются из файла, чтобы не потерять правки `set-rule` из другого процесса.
    pub fn set(&self, application_id: &str, behavior: Behavior, bundle_location: &Path) -> Result<bool> {
        let mut rules = self.rules.write();
        self.settings.refresh();
        *rules = read_rules(&self.settings);
        let previous = rules.get(application_id).cloned();

        if previous.as_ref().map(|r| r.behavior).unwrap_or_default() == behavior {
            debug!("Правило для {} не изменилось ({})", application_id, behavior);
            return Ok(false);
        }

        if behavior.is_inferred() {
            rules.remove(application_id);
        } else if let Some(rule) = rules.get_mut(application_id) {
            rule.behavior = behavior;
        } else {
            rules.insert(
                application_id.to_string(),
                Rule {
                    application_id: application_id.to_string(),
                    bundle_location: bundle_location.to_path_buf(),
                    behavior,
                },
            );
        }

        if let Err(e) = self.persist(&rules) {
            // откатываем, чтобы память совпадала с диском
            match previous {
                Some(rule) => rules.insert(application_id.to_string(), rule),
                None => rules.remove(application_id),
            };
            return Err(e);
        }

        info!("Правило для {}: {}", application_id, behavior);
        Ok(true)
    }

    /// Снимок всех правил, отсортированный по идентификатору
    pub fn all(&self) -> Vec<Rule> {
        let mut snapshot: Vec<Rule> = self.rules.read().values().cloned().collect();
        snapshot.sort_by(|a, b| a.application_id.cmp(&b.application_id));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    fn persist(&self, rules: &HashMap<String, Rule>) -> Result<()> {
        let mut records: Vec<&Rule> = rules.values().collect();
        records.sort_by(|a, b| a.application_id.cmp(&b.application_id));
        self.settings.set(KEY_RULES, &records)?;
        Ok(())
    }
}

fn read_rules(settings: &SettingsStore) -> HashMap<String, Rule> {
    let mut rules = HashMap::new();

    match settings.get_raw(KEY_RULES) {
        Some(toml::Value::Array(entries)) => {
            for (i, entry) in entries.into_iter().enumerate() {
                match entry.try_into::<Rule>() {
                    Ok(rule) if rule.behavior.is_inferred() => {
                        warn!("Правило #{} для {} без закреплённого поведения пропущено", i + 1, rule.application_id);
                    }
                    Ok(rule) if rules.contains_key(&rule.application_id) => {
                        warn!("Повторное правило #{} для {} пропущено", i + 1, rule.application_id);
                    }
                    Ok(rule) => {
                        rules.insert(rule.application_id.clone(), rule);
                    }
                    Err(e) => warn!("Некорректное правило #{} пропущено: {}", i + 1, e),
                }
            }
        }
        Some(other) => warn!("Ожидался массив правил, получено: {}", other.type_str()),
        None => {}
    }

    rules
}
