/// A named HTML email template with `{{variable}}` placeholders. The plain
/// text alternative is derived from the rendered HTML at dispatch time.
#[derive(Debug, Clone, Copy)]
pub struct EmailTemplate {
    pub name: &'static str,
    pub html: &'static str,
}

#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}
