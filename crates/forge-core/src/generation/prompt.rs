//! Prompt template for component generation.

use super::GenerationRequest;
use crate::error::Result;
use minijinja::{Environment, context};

/// Number of past chat messages sent along with a request.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

const COMPONENT_TEMPLATE: &str = r#"You are an expert React developer. Generate clean, modern React components.

Previous Context:
{% for message in history -%}
{{ message.role }}: {{ message.content }}
{% endfor %}
Current Code:
{{ current_code }}

User Request:
{{ request }}

Requirements:
- Use modern React hooks (useState, useEffect, etc.)
- Include Tailwind CSS classes for styling
- Ensure accessibility (ARIA labels, semantic HTML)
- Make it responsive and mobile-friendly
- Follow React best practices

Format your response as:
```jsx
function Component() {
  return (
    // JSX here
  );
}
```

```css
/* Additional custom styles if needed */
```

Provide a brief explanation of what you created and any key features."#;

/// Renders the generation prompt for `request`.
///
/// # Errors
///
/// Returns an internal error if the template fails to render.
pub fn build_component_prompt(request: &GenerationRequest) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("component", COMPONENT_TEMPLATE)?;
    let template = env.get_template("component")?;

    let history: Vec<_> = request
        .recent_history
        .iter()
        .map(|m| context! { role => m.role.to_string(), content => m.content })
        .collect();

    let rendered = template.render(context! {
        history => history,
        current_code => request.current_code.markup,
        request => request.content,
    })?;
    Ok(rendered)
}
