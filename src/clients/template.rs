use std::collections::HashMap;

use anyhow::{Error, Result, anyhow};
use tracing::{debug, warn};

use crate::{
    models::{
        delivery::EmailType,
        template::{EmailTemplate, RenderedEmail},
    },
    utils::strip_tags,
};

const EMAIL_VERIFICATION: EmailTemplate = EmailTemplate {
    name: "email_verification",
    html: r#"<html>
<body>
  <h2>Verificación de correo electrónico</h2>
  <p>Estimado/a {{user}}:</p>
  <p>Para activar su cuenta en AdLab Veterinario, verifique su dirección de correo ingresando al siguiente enlace:</p>
  <p>{{verification_url}}</p>
  <p>Si usted no creó esta cuenta, ignore este mensaje.</p>
</body>
</html>"#,
};

const PASSWORD_RESET: EmailTemplate = EmailTemplate {
    name: "password_reset",
    html: r#"<html>
<body>
  <h2>Restablecimiento de contraseña</h2>
  <p>Estimado/a {{user}}:</p>
  <p>Recibimos una solicitud para restablecer su contraseña. El siguiente enlace expira en {{expiry_hours}} hora(s):</p>
  <p>{{reset_url}}</p>
  <p>Si usted no solicitó este cambio, ignore este mensaje.</p>
</body>
</html>"#,
};

const SAMPLE_RECEPTION: EmailTemplate = EmailTemplate {
    name: "sample_reception",
    html: r#"<html>
<body>
  <h2>Muestra recibida</h2>
  <p>Estimado/a {{veterinarian}}:</p>
  <p>La muestra del protocolo {{protocol}} fue recibida en el laboratorio y se encuentra en procesamiento.</p>
  <p>Le notificaremos cuando el informe esté disponible.</p>
</body>
</html>"#,
};

const SAMPLE_REJECTION: EmailTemplate = EmailTemplate {
    name: "sample_rejection",
    html: r#"<html>
<body>
  <h2>Muestra rechazada</h2>
  <p>Estimado/a {{veterinarian}}:</p>
  <p>La muestra del protocolo {{protocol}} fue rechazada durante la recepción.</p>
  <p>Por favor comuníquese con el laboratorio para coordinar un nuevo envío.</p>
</body>
</html>"#,
};

const REPORT_READY: EmailTemplate = EmailTemplate {
    name: "report_ready",
    html: r#"<html>
<body>
  <h2>Informe disponible</h2>
  <p>Estimado/a {{veterinarian}}:</p>
  <p>El informe del protocolo {{protocol}} ya se encuentra disponible.</p>
  <p>Puede consultarlo en el sistema del laboratorio.</p>
</body>
</html>"#,
};

const WORK_ORDER: EmailTemplate = EmailTemplate {
    name: "work_order",
    html: r#"<html>
<body>
  <h2>Orden de trabajo</h2>
  <p>Estimado/a {{veterinarian}}:</p>
  <p>Se emitió la orden de trabajo {{work_order}} por los siguientes protocolos: {{protocols}}.</p>
  <p>Ante cualquier consulta, comuníquese con la administración del laboratorio.</p>
</body>
</html>"#,
};

const DEFAULT: EmailTemplate = EmailTemplate {
    name: "default",
    html: r#"<html>
<body>
  <h2>Notificación del laboratorio</h2>
  <p>Tiene una nueva notificación de AdLab Veterinario.</p>
  <p>Ingrese al sistema del laboratorio para ver el detalle.</p>
</body>
</html>"#,
};

/// Statically defined name → template table, built once at startup and shared
/// by reference with the dispatch task. Unknown names and types resolve to a
/// generic default instead of failing.
pub struct TemplateRegistry {
    by_name: HashMap<&'static str, EmailTemplate>,
}

impl TemplateRegistry {
    pub fn with_defaults() -> Self {
        let mut by_name = HashMap::new();

        for template in [
            EMAIL_VERIFICATION,
            PASSWORD_RESET,
            SAMPLE_RECEPTION,
            SAMPLE_REJECTION,
            REPORT_READY,
            WORK_ORDER,
            DEFAULT,
        ] {
            by_name.insert(template.name, template);
        }

        Self { by_name }
    }

    fn default_name_for(email_type: EmailType) -> &'static str {
        match email_type {
            EmailType::Verification => "email_verification",
            EmailType::PasswordReset => "password_reset",
            EmailType::SampleReception => "sample_reception",
            EmailType::SampleRejection => "sample_rejection",
            EmailType::ReportReady => "report_ready",
            EmailType::WorkOrder => "work_order",
            EmailType::Custom => "default",
        }
    }

    pub fn resolve(&self, template_name: Option<&str>, email_type: EmailType) -> &EmailTemplate {
        if let Some(name) = template_name {
            match self.by_name.get(name) {
                Some(template) => return template,
                None => {
                    warn!(
                        template_name = name,
                        "Unknown template name, falling back to type default"
                    );
                }
            }
        }

        self.by_name
            .get(Self::default_name_for(email_type))
            .unwrap_or(&DEFAULT)
    }

    pub fn render(
        &self,
        template: &EmailTemplate,
        variables: &HashMap<String, serde_json::Value>,
    ) -> Result<RenderedEmail, Error> {
        debug!(
            template_name = template.name,
            variable_count = variables.len(),
            "Rendering template"
        );

        let html = Self::replace_variables(template.html, variables)?;
        let text = strip_tags(&html);

        Ok(RenderedEmail { html, text })
    }

    fn replace_variables(
        template: &str,
        variables: &HashMap<String, serde_json::Value>,
    ) -> Result<String, Error> {
        let mut result = template.to_string();

        for (key, value) in variables {
            let placeholder = format!("{{{{{}}}}}", key);

            let replacement = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                _ => {
                    return Err(anyhow!("Unsupported variable type for key '{}'", key));
                }
            };

            result = result.replace(&placeholder, &replacement);
        }

        if result.contains("{{") && result.contains("}}") {
            let start = result.find("{{").unwrap();
            let end = result[start..].find("}}").unwrap() + start + 2;
            let missing_var = &result[start..end];

            warn!(
                missing_variable = %missing_var,
                "Template contains unreplaced variable"
            );

            return Err(anyhow!("Missing variable in template: {}", missing_var));
        }

        Ok(result)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
