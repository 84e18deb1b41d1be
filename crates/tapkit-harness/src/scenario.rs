//! Canned runs with known TAP output and exit status.

use tapkit::Tap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Three passing assertions.
    Passing,
    /// One pass, one failure.
    Failing,
    /// Plan one, run three.
    Overrun,
    /// Plan three, run one.
    UnderRun,
    /// A failure inside a TODO block, then a pass.
    Todo,
    /// Two skips and a pass.
    Skip,
    /// Declare the plan a second time.
    PlanTwice,
    /// Declare a plan of zero.
    EmptyPlan,
    /// Bail out after the first assertion.
    Bail,
    /// Expect an aborting block to survive.
    LivesAbort,
    /// Expect an aborting block to die.
    DiesAbort,
    /// Blocks that write to stdout and stderr inside the child.
    ChildOutput,
}

impl Scenario {
    /// Exit status the scenario ends with.
    #[must_use]
    pub fn expected_exit_status(self) -> u8 {
        match self {
            Self::Passing | Self::Skip | Self::DiesAbort | Self::ChildOutput => 0,
            Self::Failing | Self::Todo | Self::LivesAbort => 1,
            Self::Overrun | Self::UnderRun => 2,
            Self::PlanTwice | Self::EmptyPlan | Self::Bail => 255,
        }
    }

    /// Run against `tap` and return the exit code.
    ///
    /// `PlanTwice`, `EmptyPlan` and `Bail` end the process with status 255
    /// instead of returning.
    pub fn run(self, tap: &Tap) -> u8 {
        match self {
            Self::Passing => {
                tap.plan(3);
                tap.pass("first");
                tap.ok(2 * 2 == 4, "second");
                tap.is_eq("tap".len(), 3, "third");
            }
            Self::Failing => {
                tap.plan(2);
                tap.ok(1 + 1 == 2, "1+1==2");
                tap.ok(1 + 1 == 3, "1+1==3");
            }
            Self::Overrun => {
                tap.plan(1);
                for n in 1..=3 {
                    tap.pass(format!("assertion {n}"));
                }
            }
            Self::UnderRun => {
                tap.plan(3);
                tap.pass("only one");
            }
            Self::Todo => {
                tap.plan(2);
                tap.todo_start("not implemented yet");
                tap.fail("unfinished feature");
                tap.todo_end();
                tap.pass("finished feature");
            }
            Self::Skip => {
                tap.plan(3);
                tap.skip(2, "requires network");
                tap.pass("offline check");
            }
            Self::PlanTwice => {
                tap.plan(2);
                tap.plan(2);
                tap.pass("unreachable");
            }
            Self::EmptyPlan => {
                tap.plan(0);
                tap.pass("unreachable");
            }
            Self::Bail => {
                tap.plan(2);
                tap.pass("connected");
                tap.bail_out("database unreachable");
            }
            Self::LivesAbort => {
                tap.plan(1);
                tap.lives("abort survives", || std::process::abort());
            }
            Self::DiesAbort => {
                tap.plan(1);
                tap.dies("abort terminates", || std::process::abort());
            }
            Self::ChildOutput => {
                tap.plan(2);
                tap.dies("prints then aborts", || {
                    println!("child stdout before abort");
                    eprintln!("child stderr before abort");
                    std::process::abort();
                });
                // The parent re-runs a surviving block, so only print from
                // the child copy.
                tap.lives("prints and returns", || {
                    if tap.is_isolated_child() {
                        println!("child stdout on return");
                        eprintln!("child stderr on return");
                    }
                });
            }
        }
        tap.done_testing()
    }
}
