//! Fixed system + exemplar prefix sent ahead of every round.

use crate::Turn;
use action_dispatch::{ActionName, WireAction, WireReply};

const SYSTEM_PROMPT: &str = "\
You respond to human instructions for household tabletop tasks. Given a verbal \
instruction and an image of the tabletop, reply to the human and select robot \
actions when the instruction asks for one.

Reply with a single JSON object with exactly two keys:
- \"robot_response\": the verbal reply to the human, or null.
- \"robot_actions\": null, or a list of actions. Each action has an \"action\" name \
and \"parameters\" holding \"arg1\" (and \"arg2\" when required), each with a \
\"description\" and \"bbox_coordinates\" [x1, y1, x2, y2] detected in the image.

Available actions:
- grasp_and_place(arg1, arg2): grasp the object in box arg1 and place it at box arg2.
- grasp_and_give(arg1): grasp the object in box arg1 and hand it to the user.
- grasp_handover_give(arg1): grasp the object in box arg1 and pass it over to the user's hand.
Only the first action in the list is executed.";

fn exemplar(reply: &WireReply) -> String {
    serde_json::to_string_pretty(reply).unwrap_or_default()
}

/// System prompt plus three worked exchanges over `exemplar_image`.
pub fn base_prompt(exemplar_image: &str) -> Vec<Turn> {
    let look = WireReply {
        robot_response: Some(
            "I see a red plate in the center of the table, with an empty spam can, a banana \
             and a soda can next to it. There is a green container in the upper left corner."
                .to_string(),
        ),
        robot_actions: None,
    };
    let give = WireReply {
        robot_response: Some("Sure, here is your soda can.".to_string()),
        robot_actions: Some(vec![WireAction::new(ActionName::GraspAndGive.as_str()).arg(
            "arg1",
            "soda can",
            [317, 252, 407, 292],
        )]),
    };
    let place = WireReply {
        robot_response: Some("Sure thing.".to_string()),
        robot_actions: Some(vec![WireAction::new(ActionName::GraspAndPlace.as_str())
            .arg("arg1", "spam can", [69, 269, 158, 323])
            .arg("arg2", "container", [289, 25, 480, 112])]),
    };

    vec![
        Turn::system(SYSTEM_PROMPT),
        Turn::user(exemplar_image, "hey CURI, what do you see right now?"),
        Turn::assistant(exemplar(&look)),
        Turn::user(exemplar_image, "Can you give me the soda can on the table?"),
        Turn::assistant(exemplar(&give)),
        Turn::user(exemplar_image, "Can you put the spam can in the container?"),
        Turn::assistant(exemplar(&place)),
    ]
}
