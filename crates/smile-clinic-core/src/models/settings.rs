//! Clinic settings and outbound message templates.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CLINIC_NAME: &str = "Minha Clínica";

/// Free-text clinic identification shown on the home screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicSettings {
    pub clinic_name: String,
    pub dentist_name: String,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            clinic_name: DEFAULT_CLINIC_NAME.to_string(),
            dentist_name: String::new(),
        }
    }
}

impl ClinicSettings {
    /// Trimmed copy; a blank clinic name falls back to the default.
    pub fn normalized(&self) -> Self {
        let clinic_name = self.clinic_name.trim();
        Self {
            clinic_name: if clinic_name.is_empty() {
                DEFAULT_CLINIC_NAME.to_string()
            } else {
                clinic_name.to_string()
            },
            dentist_name: self.dentist_name.trim().to_string(),
        }
    }
}

/// Named message templates with `{placeholder}` tokens.
///
/// Missing fields in stored JSON fall back to the defaults individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WhatsAppTemplate {
    /// Placeholders: `{nome}`, `{data}`, `{horario}`
    pub appointment_reminder: String,
    /// Placeholders: `{nome}`
    pub recall_reminder: String,
    /// Placeholders: `{nome}`
    pub birthday_greeting: String,
}

impl Default for WhatsAppTemplate {
    fn default() -> Self {
        Self {
            appointment_reminder: "Olá {nome}! 😊 Lembramos que sua consulta está marcada para o dia {data} às {horario}. Aguardamos você! 🦷".to_string(),
            recall_reminder: "Olá {nome}! 😊 Faz tempo que não nos vemos! Que tal agendar uma avaliação e limpeza? Entre em contato conosco! 🦷✨".to_string(),
            birthday_greeting: "Olá {nome}! 🎉 Feliz aniversário! Desejamos um dia cheio de sorrisos. Um abraço de toda a equipe! 🦷🎂".to_string(),
        }
    }
}
