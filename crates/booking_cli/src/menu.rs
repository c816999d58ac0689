use booking_engine::{Command, EngineError, RunSettings, Workflow, WorkflowCommand};

use crate::commands::{RunContext, RunOutcome, execute};
use crate::interrupt::Interrupts;
use crate::prompt::Prompter;

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Interactive menu shown when no subcommand is given
pub struct Menu {
    workflow: Workflow,
    show_advanced: bool,
}

impl Menu {
    /// Menu starting from the command-line settings
    pub fn new(settings: RunSettings) -> Result<Self, EngineError> {
        Ok(Self {
            workflow: Workflow::new(settings)?,
            show_advanced: false,
        })
    }

    /// The state machine behind the menu
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    fn render(&self, prompter: &mut dyn Prompter) {
        let settings = self.workflow.settings();

        prompter.say("");
        prompter.say("1: Search for an appointment and book it");
        prompter.say("2: Obtain a booking code");
        if self.show_advanced {
            prompter.say("x: Hide advanced settings");
            prompter.say(&format!(
                "c: Configure only ({})",
                on_off(settings.configure_only)
            ));
            prompter.say(&format!("r: Read only ({})", on_off(settings.read_only)));
            prompter.say(&format!(
                "s: Seconds between probes ({})",
                settings.retry_seconds
            ));
        } else {
            prompter.say("x: Show advanced settings");
        }
        prompter.say("q: Quit");
    }

    /// Applies a settings change; refusals are shown, not returned
    fn adjust(&mut self, prompter: &mut dyn Prompter, change: WorkflowCommand) {
        if let Err(e) = self.workflow.apply(change) {
            prompter.say(&format!("⚠️ {}", e));
        }
    }

    /// Reads choices until the user quits, running each chosen command.
    ///
    /// Every command runs with its own stop signal from `interrupts`. Its
    /// result or error is shown and the menu comes back. Returns the outcomes
    /// of the commands that succeeded.
    pub async fn run(
        &mut self,
        ctx: &RunContext,
        prompter: &mut dyn Prompter,
        interrupts: &Interrupts,
    ) -> anyhow::Result<Vec<RunOutcome>> {
        let mut outcomes = Vec::new();

        loop {
            self.render(prompter);
            let choice = prompter.ask("Choice")?;

            let command = match choice.to_lowercase().as_str() {
                "1" => Command::Search,
                "2" => Command::Code,
                "x" => {
                    self.show_advanced = !self.show_advanced;
                    continue;
                }
                "c" if self.show_advanced => {
                    self.adjust(prompter, WorkflowCommand::ToggleConfigureOnly);
                    continue;
                }
                "r" if self.show_advanced => {
                    self.adjust(prompter, WorkflowCommand::ToggleReadOnly);
                    continue;
                }
                "s" if self.show_advanced => {
                    let answer = prompter.ask("Seconds between probes")?;
                    match answer.parse::<u64>() {
                        Ok(seconds) => {
                            self.adjust(prompter, WorkflowCommand::SetRetrySeconds(seconds))
                        }
                        Err(_) => prompter.say(&format!("⚠️ {:?} is not a number", answer)),
                    }
                    continue;
                }
                "q" => return Ok(outcomes),
                other => {
                    prompter.say(&format!("⚠️ Unknown option {:?}", other));
                    continue;
                }
            };

            self.workflow.apply(WorkflowCommand::Start(command))?;
            let settings = self.workflow.settings();

            let mut stop = interrupts.arm();
            let result = execute(command, settings, ctx, prompter, &mut stop).await;
            interrupts.disarm();

            match result {
                Ok(outcome) => {
                    self.workflow.apply(WorkflowCommand::Complete)?;
                    prompter.say(&format!("✅ {}", outcome));
                    outcomes.push(outcome);
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    self.workflow.apply(WorkflowCommand::Abort(reason.clone()))?;
                    prompter.say(&format!("❌ {}", reason));
                }
            }
            self.workflow.apply(WorkflowCommand::Reset)?;
        }
    }
}
