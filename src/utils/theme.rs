use colored::Colorize;

pub struct Theme {
    pub error_symbol: String,
    pub prompt_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub notice_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            error_symbol: "✗".red().to_string(),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            notice_style: Box::new(|s| s.bright_magenta().to_string()),
        }
    }
}

impl Theme {
    pub fn plain() -> Self {
        Theme {
            error_symbol: "✗".to_string(),
            prompt_style: Box::new(|s| s),
            error_style: Box::new(|s| s),
            notice_style: Box::new(|s| s),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "plain" => Theme::plain(),
        _ => Theme::default(),
    }
}
