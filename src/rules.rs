use anyhow::Result;
use tracing::debug;

use crate::config::Config;
use crate::models::Rule;

/// Ordered rule base used to classify review text.
///
/// Lookup is a linear scan in declaration order; the first rule with any
/// trigger contained in the lower-cased text wins.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rules: Vec<Rule>,
}

impl KnowledgeBase {
    /// Build a knowledge base, normalising triggers to lowercase
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let mut normalised = Vec::with_capacity(rules.len());

        for mut rule in rules {
            rule.triggers = rule
                .triggers
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();

            if rule.triggers.is_empty() {
                anyhow::bail!("Rule '{}' has no triggers", rule.id);
            }

            normalised.push(rule);
        }

        Ok(Self { rules: normalised })
    }

    /// Rules from config, or the built-in set when the config has none
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.knowledge_base.is_empty() {
            Self::new(default_rules())
        } else {
            Self::new(config.knowledge_base.clone())
        }
    }

    /// Return the first rule whose trigger occurs in `text`
    pub fn classify(&self, text: &str) -> Option<&Rule> {
        let text = text.to_lowercase();

        let rule = self
            .rules
            .iter()
            .find(|rule| rule.triggers.iter().any(|t| text.contains(t.as_str())));

        if let Some(rule) = rule {
            debug!(rule = %rule.id, "Rule matched");
        }

        rule
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rule(id: &str, triggers: &[&str], problem: &str, solution: &str) -> Rule {
    Rule {
        id: id.to_string(),
        triggers: triggers.iter().map(|t| t.to_string()).collect(),
        problem: problem.to_string(),
        solution: solution.to_string(),
    }
}

/// Built-in rule base for bathroom scales
pub fn default_rules() -> Vec<Rule> {
    vec![
        rule(
            "display",
            &["синий", "экран", "дисплей", "не горит"],
            "Display colour or visibility",
            "Синяя подсветка дисплея штатная для этой модели. Если цифры плохо видны, \
             замените элементы питания и протрите стекло сухой тканью.",
        ),
        rule(
            "power",
            &["не включа", "батарейк", "элемент питания", "разряд"],
            "Device does not power on",
            "Снимите защитную плёнку с контактов батарейного отсека и проверьте \
             полярность элементов питания. Весы включаются лёгким нажатием на платформу.",
        ),
        rule(
            "accuracy",
            &["неточн", "погрешност", "врут", "разные показания", "показывают разный"],
            "Measurement accuracy",
            "Поставьте весы на ровный твёрдый пол, не на ковёр, и взвешивайтесь в одной \
             и той же точке. После перемещения весов дайте им откалиброваться: встаньте \
             и сойдите с платформы один раз.",
        ),
        rule(
            "app",
            &["приложени", "bluetooth", "блютуз", "синхрон"],
            "Companion app connection",
            "Включите Bluetooth и геолокацию на телефоне, удалите весы из списка \
             устройств и выполните сопряжение заново из приложения.",
        ),
        rule(
            "damage",
            &["разбит", "трещин", "поврежд", "сколы", "упаковк"],
            "Arrived damaged",
            "Оформите возврат или обмен в личном кабинете в разделе заказов, \
             приложив фото повреждения. Мы заменим товар.",
        ),
    ]
}
