//! Canned Scenarios
//!
//! Scripted argument and debate content replayed when the backend cannot be
//! reached. A scenario is picked by case-insensitive substring match on the
//! user's input; the first scenario with a matching keyword wins and
//! [`GENERIC`] covers everything else.

/// One scripted `argument_generated` event
#[derive(Debug)]
pub struct ScriptedArgument {
    /// Agent name
    pub agent: &'static str,
    /// Argument text
    pub content: &'static str,
    /// Reasoning shown alongside
    pub thinking: &'static str,
}

/// One scripted `debate_turn` event
#[derive(Debug)]
pub struct ScriptedTurn {
    /// Prosecutor argument
    pub prosecutor: &'static str,
    /// Prosecutor reasoning
    pub prosecutor_thinking: &'static str,
    /// Defender response
    pub defender: &'static str,
    /// Defender reasoning
    pub defender_thinking: &'static str,
}

/// Scripted `feedback_ready` event
#[derive(Debug)]
pub struct ScriptedFeedback {
    /// Suggested next steps
    pub recommendations: &'static [&'static str],
    /// Strong points
    pub strengths: &'static [&'static str],
    /// Weak points
    pub weaknesses: &'static [&'static str],
    /// Free-form summary
    pub summary: &'static str,
}

/// A canned event sequence
#[derive(Debug)]
pub struct Scenario {
    /// Scenario name, used in logs
    pub name: &'static str,
    /// Lowercase substrings that select this scenario
    pub keywords: &'static [&'static str],
    /// Content for single-analysis mode
    pub arguments: &'static [ScriptedArgument],
    /// Content for debate mode
    pub turns: &'static [ScriptedTurn],
    /// Terminal feedback for both modes
    pub feedback: ScriptedFeedback,
}

impl Scenario {
    /// Whether `input` selects this scenario
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        let input = input.to_lowercase();
        self.keywords.iter().any(|k| input.contains(k))
    }
}

/// Pick the scenario for `input`
#[must_use]
pub fn select(input: &str) -> &'static Scenario {
    SCENARIOS
        .iter()
        .find(|s| s.matches(input))
        .unwrap_or(&GENERIC)
}

/// Every keyed scenario, in match priority order
pub static SCENARIOS: [Scenario; 4] = [PERSONAL_INJURY, CONTRACT, CRIMINAL, EMPLOYMENT];

/// Pedestrian injury claim
pub const PERSONAL_INJURY: Scenario = Scenario {
    name: "personal_injury",
    keywords: &[
        "texting while walking",
        "injury",
        "injured",
        "accident",
        "negligence",
        "slip",
    ],
    arguments: &[
        ScriptedArgument {
            agent: "prosecutor",
            content: "The driver owed every pedestrian a duty of reasonable care and breached it \
                      by failing to yield at a marked crossing. The breach is the proximate cause \
                      of the plaintiff's injuries.",
            thinking: "Establish duty and breach first; the crossing markings make breach hard \
                       to dispute.",
        },
        ScriptedArgument {
            agent: "defender",
            content: "The plaintiff was texting while walking and stepped into the roadway \
                      without looking. Comparative negligence reduces, and may bar, any recovery.",
            thinking: "Shift attention to the plaintiff's own conduct and argue apportionment.",
        },
    ],
    turns: &[
        ScriptedTurn {
            prosecutor: "A driver approaching a marked crossing must anticipate pedestrians. \
                         Distraction by the pedestrian does not erase that duty.",
            prosecutor_thinking: "Anchor the debate on the driver's heightened duty at crossings.",
            defender: "Duty is not unlimited. A pedestrian absorbed in a phone creates a hazard \
                       no reasonable driver can foresee in time.",
            defender_thinking: "Frame the plaintiff's conduct as an intervening cause.",
        },
        ScriptedTurn {
            prosecutor: "Witnesses place the vehicle above the posted limit. At lawful speed the \
                         driver would have stopped regardless of where the plaintiff was looking.",
            prosecutor_thinking: "Speed evidence defeats the foreseeability argument.",
            defender: "Even accepting the speed estimate, the plaintiff's share of fault should \
                       be weighed by the jury and reduce damages accordingly.",
            defender_thinking: "Concede partially and fight on apportionment.",
        },
    ],
    feedback: ScriptedFeedback {
        recommendations: &[
            "Obtain traffic camera footage and phone records for the time of the collision",
            "Retain an accident reconstruction expert to establish vehicle speed",
            "Prepare for a comparative negligence defense",
        ],
        strengths: &[
            "Marked crossing establishes a clear duty to yield",
            "Independent witnesses support the speeding claim",
        ],
        weaknesses: &[
            "Plaintiff's phone use invites comparative fault",
            "Medical records show a prior injury to the same knee",
        ],
        summary: "Liability is likely but damages may be reduced for comparative negligence.",
    },
};

/// Commercial contract dispute
pub const CONTRACT: Scenario = Scenario {
    name: "contract_breach",
    keywords: &["contract", "breach", "agreement", "invoice"],
    arguments: &[
        ScriptedArgument {
            agent: "prosecutor",
            content: "The supplier accepted the purchase order and missed every delivery date \
                      in it. Late delivery of time-critical goods is a material breach.",
            thinking: "Lead with the written terms; time was expressly of the essence.",
        },
        ScriptedArgument {
            agent: "defender",
            content: "The buyer changed the specification twice after signing. The delays flow \
                      from those changes, and the contract's force majeure clause covers the \
                      port closure.",
            thinking: "Attribute the delay to the buyer and invoke the excusal clause.",
        },
    ],
    turns: &[ScriptedTurn {
        prosecutor: "The specification changes were minor and agreed without any extension of \
                     the delivery schedule.",
        prosecutor_thinking: "Close off the change-order excuse with the correspondence.",
        defender: "Acceptance of partial deliveries without objection waived strict compliance \
                   with the dates.",
        defender_thinking: "Waiver by conduct is the strongest remaining defense.",
    }],
    feedback: ScriptedFeedback {
        recommendations: &[
            "Collect all change-order correspondence",
            "Quantify losses caused by each late delivery",
        ],
        strengths: &["Delivery dates are stated in the signed agreement"],
        weaknesses: &["Partial deliveries were accepted without written objection"],
        summary: "A material breach claim is viable; expect a waiver defense.",
    },
};

/// Criminal defense matter
pub const CRIMINAL: Scenario = Scenario {
    name: "criminal_defense",
    keywords: &["theft", "assault", "criminal", "arrest", "charged"],
    arguments: &[
        ScriptedArgument {
            agent: "prosecutor",
            content: "Store footage shows the defendant leaving with unpaid merchandise, and \
                      the items were recovered from the defendant's bag.",
            thinking: "Physical evidence and video together satisfy each element.",
        },
        ScriptedArgument {
            agent: "defender",
            content: "The footage does not show intent to permanently deprive. The defendant \
                      was stopped before leaving the premises and offered to pay.",
            thinking: "Attack intent; it is the weakest element for the prosecution.",
        },
    ],
    turns: &[ScriptedTurn {
        prosecutor: "Concealment in a personal bag is itself evidence of intent.",
        prosecutor_thinking: "Concealment cases usually survive a motion to dismiss.",
        defender: "The bag was open and the items were in plain view of staff.",
        defender_thinking: "Use the store's own footage to rebut concealment.",
    }],
    feedback: ScriptedFeedback {
        recommendations: &[
            "Request the complete, unedited surveillance footage",
            "Interview the staff member who made the stop",
        ],
        strengths: &["Intent is contestable on the available evidence"],
        weaknesses: &["Items were recovered from the defendant"],
        summary: "The case turns on intent; a diversion outcome is realistic.",
    },
};

/// Employment dispute
pub const EMPLOYMENT: Scenario = Scenario {
    name: "employment",
    keywords: &["fired", "termination", "terminated", "discrimination", "wrongful"],
    arguments: &[
        ScriptedArgument {
            agent: "prosecutor",
            content: "The employee was dismissed two weeks after filing a discrimination \
                      complaint. The timing supports an inference of retaliation.",
            thinking: "Temporal proximity carries the prima facie case.",
        },
        ScriptedArgument {
            agent: "defender",
            content: "Performance warnings predate the complaint by several months and the \
                      dismissal followed the documented process.",
            thinking: "Show a legitimate, pre-existing reason for the dismissal.",
        },
    ],
    turns: &[ScriptedTurn {
        prosecutor: "The earlier warnings were informal and never escalated until after the \
                     complaint.",
        prosecutor_thinking: "Argue pretext by showing the process only started afterward.",
        defender: "Informal warnings are still warnings; the handbook requires no more.",
        defender_thinking: "Lean on the handbook's progressive discipline language.",
    }],
    feedback: ScriptedFeedback {
        recommendations: &[
            "Obtain the personnel file and all performance reviews",
            "Identify comparators who were treated differently",
        ],
        strengths: &["Close timing between complaint and dismissal"],
        weaknesses: &["Documented performance concerns predate the complaint"],
        summary: "A retaliation claim is arguable; pretext evidence will decide it.",
    },
};

/// Fallback for inputs no keyed scenario matches
pub static GENERIC: Scenario = Scenario {
    name: "generic",
    keywords: &[],
    arguments: &[ScriptedArgument {
        agent: "analyst",
        content: "Preliminary review: identify the governing law, the facts in dispute and \
                  the remedy sought before building arguments on either side.",
        thinking: "Not enough detail to pick a specific theory of the case.",
    }],
    turns: &[ScriptedTurn {
        prosecutor: "The facts as described suggest a claim worth developing.",
        prosecutor_thinking: "Keep the position general until more facts arrive.",
        defender: "Without documents or witnesses the claim cannot yet be assessed.",
        defender_thinking: "Press for evidence before conceding anything.",
    }],
    feedback: ScriptedFeedback {
        recommendations: &["Provide more detail about the parties, dates and documents involved"],
        strengths: &[],
        weaknesses: &["Too little information for a substantive analysis"],
        summary: "More facts are needed for a meaningful assessment.",
    },
};
