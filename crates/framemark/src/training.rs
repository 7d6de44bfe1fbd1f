use std::fmt;

use crate::settings::TrainingSettings;

/// The `yolo detect train` invocation for a prepared dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingCommand {
    args: Vec<(String, String)>,
}

impl TrainingCommand {
    pub fn from_settings(settings: &TrainingSettings) -> Self {
        let mut args = vec![
            ("data".to_string(), settings.data.clone()),
            ("model".to_string(), settings.model.clone()),
            ("epochs".to_string(), settings.epochs.to_string()),
            ("imgsz".to_string(), settings.imgsz.to_string()),
            ("name".to_string(), settings.name.clone()),
        ];
        // Extra keys may not override the fixed arguments above.
        let extra: Vec<(String, String)> = settings
            .extra
            .iter()
            .filter(|(key, _)| !args.iter().any(|(fixed, _)| fixed == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        args.extend(extra);
        Self { args }
    }

    pub fn render(&self) -> String {
        let mut line = String::from("yolo detect train");
        for (key, value) in &self.args {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

impl fmt::Display for TrainingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
