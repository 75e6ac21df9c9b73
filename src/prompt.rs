//! Prompt construction.
//!
//! Pure functions of (task, session id, config) — no I/O. The rendered
//! document is the contract surface between the bridge and the external
//! agent: frame discovery, report discovery, and URL extraction all
//! depend on the agent obeying the naming patterns embedded here.

use crate::config::BridgeConfig;

/// HTML skeleton the agent must reproduce for its report. The
/// `{{SESSION_ID}}` and `{{TASK}}` placeholders are substituted before
/// the template is spliced into the prompt; the bracketed markers are
/// left for the agent to fill in.
const REPORT_TEMPLATE_HTML: &str = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>QA Report: {{SESSION_ID}}</title>
    <style>
        body { background-color: #f4f4f9; font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 40px 0; }
        .report-container { width: 80%; max-width: 1200px; margin: 0 auto; background: #ffffff; padding: 40px; border-radius: 12px; box-shadow: 0 4px 12px rgba(0,0,0,0.1); }
        @media (max-width: 768px) { .report-container { width: 95%; padding: 20px; } body { padding: 10px 0; } }
        h1 { border-bottom: 2px solid #eee; padding-bottom: 15px; margin-top: 0; color: #2c3e50; }
        h2 { color: #34495e; margin-top: 30px; }
        .meta { background: #f8f9fa; padding: 20px; border-radius: 8px; border: 1px solid #e9ecef; }
        .meta p { margin: 8px 0; }
        .status-pass { color: #27ae60; font-weight: bold; background: #e8f8f5; padding: 2px 8px; border-radius: 4px; }
        .status-fail { color: #c0392b; font-weight: bold; background: #fdedec; padding: 2px 8px; border-radius: 4px; }
        .gif-container { margin: 25px 0; border: 1px solid #ddd; border-radius: 8px; overflow: hidden; box-shadow: 0 2px 5px rgba(0,0,0,0.05); }
        img { max-width: 100%; display: block; width: 100%; height: auto; }
        .observations { background: #fbfbfb; border-left: 4px solid #3498db; padding: 10px 20px; }
        li { margin-bottom: 10px; }
    </style>
</head>
<body>
    <div class="report-container">
        <h1>Assessment Report</h1>
        <div class="meta">
            <p><strong>Date:</strong> [Insert Date & Time]</p>
            <p><strong>Target URL:</strong> <a href="[Insert URL]" target="_blank">[Insert URL]</a></p>
            <p><strong>Session ID:</strong> {{SESSION_ID}}</p>
            <p><strong>Result:</strong> <span class="[Use 'status-pass' or 'status-fail']">[PASS or FAIL]</span></p>
        </div>

        <h2>Task</h2>
        <p>{{TASK}}</p>

        <h2>Executive Summary</h2>
        <p>[Insert a 2-3 sentence high-level summary of the test run.]</p>

        <h2>Visual Session</h2>
        <div class="gif-container">
            <img src="../recordings/{{SESSION_ID}}.gif" alt="Session Recording" />
            <p style="text-align: center; font-size: 0.9em; color: #666; padding: 10px;">(Automated Session Recording)</p>
        </div>

        <h2>Detailed Observations</h2>
        <div class="observations">
            <h3>Functionality</h3>
            <ul>
                <li>[Observation 1]</li>
                <li>[...Add more items as needed]</li>
            </ul>
            <h3>UI/UX & Usability</h3>
            <ul>
                <li>[Feedback 1]</li>
                <li>[...Add more items as needed]</li>
            </ul>
        </div>
    </div>
</body>
</html>
"#;

/// Substitute every occurrence of both placeholders. No `{{...}}`
/// marker survives in the output.
pub fn render_report_template(session_id: &str, task: &str) -> String {
    REPORT_TEMPLATE_HTML
        .replace("{{SESSION_ID}}", session_id)
        .replace("{{TASK}}", task)
}

/// Render the full instruction document for one session.
pub fn build(task: &str, session_id: &str, config: &BridgeConfig) -> String {
    let base_url = &config.base_url;
    let reports_dir = config.reports_dir();
    let reports_dir = reports_dir.display();
    let recordings_dir = config.recordings_dir();
    let recordings_dir = recordings_dir.display();
    let report_html = render_report_template(session_id, task);

    format!(
        r#"You are a senior QA Agent.

*** STRICT SYSTEM PROTOCOLS ***
1. NO SCRIPTING: Do NOT create or execute .js, .py, or .sh files. Use playwright mcp tool directly.
2. IGNORE SCHEMA ERRORS: If you see "no schema with key" errors, ignore them. The tools work correctly.
3. VISUALS: Video recording is unavailable.
4. NO RETRIES: If a step fails, document the failure and continue. Do NOT restart the session.

Context:
- Base URL: {base_url}/walk-reports
- Reports dir: {reports_dir}
- Recordings dir: {recordings_dir}
- SESSION ID: {session_id}

User Request: "{task}"

Task:
1. Identify the URL and instructions from the request
    - Use the provided SESSION ID ({session_id}) to prefix ALL files created during this session to prevent overwriting previous runs.
2. Use the 'playwright' mcp tool specified in settings.json to launch a browser.
    - **CRITICAL:** First, navigate to 'about:blank' and use 'browser_evaluate' to run: "localStorage.clear(); sessionStorage.clear();" to ensure a clean state.
    - Navigate to the URL.
    - Perform the user's requested actions.
    - **CRITICAL:** Immediately after *every* action, save a screenshot (including the initial action when opening target URL)
    - **NAMING & SAVING:** You MUST use 'browser_screenshot' with the 'path' argument set to the **ABSOLUTE PATH** following this exact pattern:
      - Pattern: {recordings_dir}/{session_id}_step_01.png
      - (Increment the step number for each action)

3. Act as an expert QA analyst. Analyze the session for:
    - **Overall Success:** Did the flow complete without errors?
    - **UI/UX Feedback:** Identify friction points, confusing layout, visual glitches, or slow interactions.
    - **Usability:** Note any steps that felt unintuitive or required extra effort.

4. Generate an HTML report in the reports directory named 'report_{session_id}.html'.
- **STRICT STRUCTURE:** Use the HTML template provided below.
    - **DYNAMIC CONTENT:** You must generate as many <li> items as necessary.
    *** BEGIN HTML TEMPLATE ***
    {report_html}
    *** END HTML TEMPLATE ***
5. Return the URL of the generated report (e.g., {base_url}/walk-reports/report_{session_id}.html) as the final output.
6. Close browser session."#
    )
}
